use std::{cell::RefCell, rc::Rc};

use super::{Registry, SubjectState};
use crate::{
    errors::{RxError, UnsubscriptionError},
    observer::Observer,
    subscription::subscribe::{Subscribeable, Subscriber, Subscription, Unsubscribeable},
    Observable, ObservableExt,
};

/// A `Subject` represents a unique variant of an `Observable` that enables
/// multicasting values to multiple `Observers`.
///
/// Unlike regular `Observables`, which are unicast (each subscribed `Observer` has
/// its independent execution of the `Observable`), `Subjects` are multicast.
///
/// Observers only receive values emitted after they subscribed. Once the subject
/// has errored or completed, later subscribers immediately receive that same
/// terminal notification and nothing else.
///
/// You use the `Subject` type by invoking its `emitter_receiver` function to get a
/// [`SubjectEmitter`] for emitting values and a [`SubjectReceiver`] for subscribing
/// to emitted values.
///
/// # Examples
///
/// Subject completion
///
///```no_run
/// use rxpush::{subjects::Subject, subscribe::Subscriber};
/// use rxpush::{ObservableExt, Observer, Subscribeable};
///
/// pub fn create_subscriber(subscriber_id: i32) -> Subscriber<i32> {
///     Subscriber::new(
///         move |v| println!("Subscriber #{} emitted: {}", subscriber_id, v),
///         |_| eprintln!("Error"),
///         move || println!("Completed {}", subscriber_id),
///     )
/// }
///
/// // Initialize a `Subject` and obtain its emitter and receiver.
/// let (mut emitter, receiver) = Subject::emitter_receiver();
///
/// // Registers `Subscriber` 1.
/// let _ = receiver.subscribe(create_subscriber(1));
///
/// emitter.next(101); // Emits 101 to registered `Subscriber` 1.
/// emitter.next(102); // Emits 102 to registered `Subscriber` 1.
///
/// // All Observable operators can be applied to the receiver.
/// let _ = receiver
///     .clone() // Shallow clone: clones only the pointer to the `Subject`.
///     .map(|v| format!("mapped {}", v))
///     .subscribe(Subscriber::new(
///         |v| println!("Subscriber #2 emitted: {}", v),
///         |_| eprintln!("Error"),
///         || println!("Completed 2"),
///     ));
///
/// emitter.next(103); // Emits 103 to registered `Subscriber`'s 1 and 2.
///
/// emitter.complete(); // Calls `complete` on registered `Subscriber`'s 1 and 2.
///
/// // Subscriber 3: post-completion subscribe, completes immediately.
/// let _ = receiver.subscribe(create_subscriber(3));
///
/// emitter.next(104); // Called post-completion, does not emit.
///```
pub struct Subject<T> {
    registry: Registry<T>,
}

impl<T: 'static> SubjectState for Subject<T> {
    type Item = T;

    fn registry(&mut self) -> &mut Registry<T> {
        &mut self.registry
    }
}

impl<T: 'static> Subject<T> {
    /// Creates a new pair of `SubjectEmitter` for emitting values and
    /// `SubjectReceiver` for subscribing to values.
    pub fn emitter_receiver() -> (SubjectEmitter<T>, SubjectReceiver<T>) {
        let s = Rc::new(RefCell::new(Subject {
            registry: Registry::new(),
        }));

        (SubjectEmitter(Rc::clone(&s)), SubjectReceiver(s))
    }
}

/// Subscription handler for `Subject`.
///
/// `SubjectReceiver` acts as an `Observable`, allowing you to utilize its
/// `subscribe` method for receiving emissions from the `Subject`'s multicasting.
/// You can also employ its `unsubscribe` method to close the `Subject` and
/// remove registered observers.
#[derive(Clone)]
pub struct SubjectReceiver<T>(Rc<RefCell<Subject<T>>>);

/// Multicasting emitter for `Subject`.
///
/// `SubjectEmitter` acts as an `Observer`, allowing you to utilize its `next`,
/// `error`, and `complete` methods for multicasting emissions to all registered
/// observers within the `Subject`.
#[derive(Clone)]
pub struct SubjectEmitter<T>(Rc<RefCell<Subject<T>>>);

impl<T: 'static> SubjectReceiver<T> {
    /// Returns the number of registered observers.
    pub fn len(&self) -> usize {
        super::len(&self.0)
    }

    /// Returns `true` if no observers are registered, `false` otherwise.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Subscribeable for SubjectReceiver<T> {
    type ObsType = T;

    fn subscribe(&self, v: Subscriber<Self::ObsType>) -> Result<Subscription, RxError> {
        super::register(&self.0, v, Vec::new())
    }
}

impl<T: 'static> Unsubscribeable for SubjectReceiver<T> {
    /// Closes the subject: registered observers are unsubscribed and new
    /// subscriptions fail with `ObservableError::SubjectClosed`.
    fn unsubscribe(&self) -> Result<(), UnsubscriptionError> {
        super::close(&self.0)
    }

    fn is_closed(&self) -> bool {
        self.0.borrow().registry.is_closed()
    }
}

impl<T: Clone> Observer for SubjectEmitter<T> {
    type NextFnType = T;

    fn next(&mut self, v: Self::NextFnType) {
        let observers = self.0.borrow().registry.snapshot();
        super::next_all(observers, v);
    }

    fn error(&mut self, e: RxError) {
        let observers = self.0.borrow_mut().registry.latch_error(e.clone());
        super::error_all(observers, e);
    }

    fn complete(&mut self) {
        let observers = self.0.borrow_mut().registry.latch_complete();
        super::complete_all(observers);
    }
}

impl<T: Clone + 'static> From<SubjectEmitter<T>> for Subscriber<T> {
    fn from(value: SubjectEmitter<T>) -> Self {
        Subscriber::from_observer(value)
    }
}

impl<T: Clone + 'static> From<SubjectReceiver<T>> for Observable<T> {
    fn from(value: SubjectReceiver<T>) -> Self {
        value.into_observable()
    }
}
