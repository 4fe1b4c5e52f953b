use std::{error::Error, fmt, ops::Deref, rc::Rc};

/// Error value carried through the `error` channel of observables and subjects.
///
/// `RxError` is a cheap, reference counted handle around any `std::error::Error`.
/// Cloning it shares the same underlying error, which lets a `Subject` hand the
/// very same error to every registered observer and lets callers check error
/// identity with [`ptr_eq`].
///
/// Any type implementing `Error + 'static` converts into `RxError`, so the `?`
/// operator works inside fallible producers and callbacks.
///
/// [`ptr_eq`]: struct.RxError.html#method.ptr_eq
#[derive(Clone)]
pub struct RxError(Rc<dyn Error>);

impl RxError {
    /// Wraps an error.
    pub fn new(error: impl Error + 'static) -> Self {
        RxError(Rc::new(error))
    }

    /// Builds an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        RxError(Rc::new(MessageError(message.into())))
    }

    /// Returns a reference to the wrapped error if it is of type `E`.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    /// Returns `true` if both handles point to the same error instance.
    pub fn ptr_eq(&self, other: &RxError) -> bool {
        Rc::as_ptr(&self.0).cast::<u8>() == Rc::as_ptr(&other.0).cast::<u8>()
    }
}

impl<E: Error + 'static> From<E> for RxError {
    fn from(error: E) -> Self {
        RxError(Rc::new(error))
    }
}

impl Deref for RxError {
    type Target = dyn Error;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl AsRef<dyn Error> for RxError {
    fn as_ref(&self) -> &(dyn Error + 'static) {
        self.0.as_ref()
    }
}

impl fmt::Display for RxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for RxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RxError").field(&self.0).finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MessageError(String);

/// Failures raised by the library itself rather than by user code.
#[derive(Debug, thiserror::Error)]
pub enum ObservableError {
    /// The receiver half of a subject was unsubscribed; it accepts no new
    /// subscriptions.
    #[error("subject has been unsubscribed and accepts no new subscriptions")]
    SubjectClosed,

    /// The producer dropped its subscriber without ever terminating the stream.
    #[error("observable dropped its subscriber before completing or erroring")]
    Abandoned,
}

/// Aggregate of every failure raised by teardown actions during a single
/// `unsubscribe` call.
///
/// All teardowns run even when some of them fail; this error is returned once
/// the whole teardown tree has been released.
#[derive(Debug, thiserror::Error)]
#[error(
    "{} errors occurred while unsubscribing:\n{}",
    .errors.len(),
    render_indexed(.errors)
)]
pub struct UnsubscriptionError {
    errors: Vec<RxError>,
}

impl UnsubscriptionError {
    pub(crate) fn new(errors: Vec<RxError>) -> Self {
        UnsubscriptionError { errors }
    }

    /// Individual teardown failures, in the order the teardowns ran.
    pub fn errors(&self) -> &[RxError] {
        &self.errors
    }

    /// Consumes the aggregate and returns the individual failures.
    pub fn into_errors(self) -> Vec<RxError> {
        self.errors
    }
}

fn render_indexed(errors: &[RxError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, e)| format!("  {}. {}", i, e))
        .collect::<Vec<_>>()
        .join("\n")
}
