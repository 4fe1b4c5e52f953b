use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
};

use crate::errors::{report_unhandled, RxError, Turn, UnsubscriptionError};

type TeardownFn = Box<dyn FnOnce() -> Result<(), RxError>>;

/// Cleanup returned by an observable's producer and attached to its subscriber.
///
/// Whatever the producer returns runs exactly once, when the subscription is
/// released, whether that happens because the consumer unsubscribed or because
/// the stream terminated.
pub enum TeardownLogic {
    /// Nothing to clean up.
    Nil,
    /// Infallible cleanup action.
    Logic(Box<dyn FnOnce()>),
    /// Cleanup action that may fail. Failures are collected into the
    /// `UnsubscriptionError` returned by `unsubscribe`.
    Fallible(TeardownFn),
    /// Another subscription released together with this one.
    Wrapped(Subscription),
}

impl TeardownLogic {
    /// Wraps an infallible cleanup closure.
    pub fn logic(f: impl FnOnce() + 'static) -> Self {
        TeardownLogic::Logic(Box::new(f))
    }

    /// Wraps a cleanup closure that may fail.
    pub fn fallible(f: impl FnOnce() -> Result<(), RxError> + 'static) -> Self {
        TeardownLogic::Fallible(Box::new(f))
    }
}

impl From<Subscription> for TeardownLogic {
    fn from(subscription: Subscription) -> Self {
        TeardownLogic::Wrapped(subscription)
    }
}

impl From<()> for TeardownLogic {
    fn from(_: ()) -> Self {
        TeardownLogic::Nil
    }
}

impl fmt::Debug for TeardownLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownLogic::Nil => f.write_str("Nil"),
            TeardownLogic::Logic(_) => f.write_str("Logic(..)"),
            TeardownLogic::Fallible(_) => f.write_str("Fallible(..)"),
            TeardownLogic::Wrapped(s) => f.debug_tuple("Wrapped").field(s).finish(),
        }
    }
}

/// Key of an entry stored in a [`Subscription`], used to remove it again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TeardownId(u64);

enum Teardown {
    Action(TeardownFn),
    Child(Subscription),
}

impl Teardown {
    fn run(self, errors: &mut Vec<RxError>) {
        match self {
            Teardown::Action(f) => {
                if let Err(e) = f() {
                    errors.push(e);
                }
            }
            Teardown::Child(child) => {
                if let Err(nested) = child.unsubscribe() {
                    errors.extend(nested.into_errors());
                }
            }
        }
    }
}

#[derive(Default)]
struct Inner {
    closed: bool,
    initial: Option<TeardownFn>,
    entries: Vec<(TeardownId, Teardown)>,
    next_id: u64,
}

/// Handle to a set of cleanup actions released together.
///
/// Subscriptions nest: adding one subscription to another makes the child
/// release when the parent does, and a child released on its own removes
/// itself from the parent. Clones share the same underlying state.
#[derive(Clone, Default)]
pub struct Subscription(Rc<RefCell<Inner>>);

impl Subscription {
    /// Creates an open subscription that runs `initial` when released.
    pub fn new(initial: impl FnOnce() + 'static) -> Self {
        Subscription(Rc::new(RefCell::new(Inner {
            initial: Some(Box::new(move || {
                initial();
                Ok(())
            })),
            ..Inner::default()
        })))
    }

    /// Creates a subscription that is already closed.
    pub fn closed() -> Self {
        Subscription(Rc::new(RefCell::new(Inner {
            closed: true,
            ..Inner::default()
        })))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.borrow().closed
    }

    /// Number of teardown entries currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if both handles refer to the same subscription.
    #[must_use]
    pub fn ptr_eq(&self, other: &Subscription) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Attaches `teardown` to this subscription.
    ///
    /// Adding a subscription to itself is ignored, as is `TeardownLogic::Nil`.
    /// When this subscription is already closed the teardown runs immediately
    /// and any failure goes to the unhandled-error sink.
    ///
    /// # Returns
    ///
    /// The id of the stored entry, or `None` if nothing was stored.
    pub fn add(&self, teardown: impl Into<TeardownLogic>) -> Option<TeardownId> {
        let teardown = match teardown.into() {
            TeardownLogic::Nil => return None,
            TeardownLogic::Wrapped(child) if child.ptr_eq(self) => return None,
            TeardownLogic::Wrapped(child) => Teardown::Child(child),
            TeardownLogic::Logic(f) => Teardown::Action(Box::new(move || {
                f();
                Ok(())
            })),
            TeardownLogic::Fallible(f) => Teardown::Action(f),
        };

        let mut inner = self.0.borrow_mut();
        if inner.closed {
            drop(inner);
            let mut errors = Vec::new();
            teardown.run(&mut errors);
            for e in errors {
                tracing::warn!(error = %e, "teardown added to a closed subscription failed");
                report_unhandled(e);
            }
            return None;
        }

        let id = TeardownId(inner.next_id);
        inner.next_id += 1;
        let child = match &teardown {
            Teardown::Child(child) => Some(child.clone()),
            Teardown::Action(_) => None,
        };
        inner.entries.push((id, teardown));
        drop(inner);

        if let Some(child) = child {
            let parent: Weak<RefCell<Inner>> = Rc::downgrade(&self.0);
            child.add(TeardownLogic::logic(move || {
                if let Some(parent) = parent.upgrade() {
                    Subscription(parent).remove(id);
                }
            }));
        }
        Some(id)
    }

    /// Removes an entry without running it.
    pub fn remove(&self, id: TeardownId) {
        let removed = {
            let mut inner = self.0.borrow_mut();
            inner
                .entries
                .iter()
                .position(|(entry, _)| *entry == id)
                .map(|pos| inner.entries.remove(pos))
        };
        drop(removed);
    }

    /// Removes a nested subscription without releasing it.
    pub fn remove_child(&self, child: &Subscription) {
        let removed = {
            let mut inner = self.0.borrow_mut();
            inner
                .entries
                .iter()
                .position(|(_, entry)| matches!(entry, Teardown::Child(c) if c.ptr_eq(child)))
                .map(|pos| inner.entries.remove(pos))
        };
        drop(removed);
    }

    /// Releases every stored teardown, in insertion order.
    ///
    /// Calling this more than once has no further effect. Every teardown runs
    /// even if an earlier one failed; the failures are returned together.
    pub fn unsubscribe(&self) -> Result<(), UnsubscriptionError> {
        let _turn = Turn::enter();
        let (initial, entries) = {
            let mut inner = self.0.borrow_mut();
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
            (inner.initial.take(), std::mem::take(&mut inner.entries))
        };

        let mut errors = Vec::new();
        if let Some(initial) = initial {
            Teardown::Action(initial).run(&mut errors);
        }
        for (_, teardown) in entries {
            teardown.run(&mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            tracing::trace!(failures = errors.len(), "subscription released with failures");
            Err(UnsubscriptionError::new(errors))
        }
    }

    /// Unsubscribes and sends any teardown failures to the unhandled-error sink.
    pub(crate) fn release(&self) {
        if let Err(e) = self.unsubscribe() {
            tracing::warn!(error = %e, "teardown failed with no caller to report to");
            report_unhandled(e.into());
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(inner) => f
                .debug_struct("Subscription")
                .field("closed", &inner.closed)
                .field("entries", &inner.entries.len())
                .finish(),
            Err(_) => f.write_str("Subscription { .. }"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce() + 'static) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (count, move || c.set(c.get() + 1))
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let (count, f) = counter();
        let s = Subscription::new(f);

        assert!(s.unsubscribe().is_ok());
        assert!(s.unsubscribe().is_ok());
        assert!(s.is_closed());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn teardowns_run_in_insertion_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let s = Subscription::default();
        for i in 0..3 {
            let order = Rc::clone(&order);
            s.add(TeardownLogic::logic(move || order.borrow_mut().push(i)));
        }

        s.unsubscribe().unwrap();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn failing_teardowns_do_not_stop_the_rest() {
        let (count, f) = counter();
        let s = Subscription::default();
        s.add(TeardownLogic::fallible(|| Err(RxError::msg("first"))));
        s.add(TeardownLogic::logic(f));
        s.add(TeardownLogic::fallible(|| Err(RxError::msg("second"))));

        let err = s.unsubscribe().unwrap_err();
        assert_eq!(count.get(), 1);
        assert_eq!(err.errors().len(), 2);
        assert_eq!(err.errors()[0].to_string(), "first");
        assert_eq!(err.errors()[1].to_string(), "second");
    }

    #[test]
    fn nested_failures_are_flattened() {
        let parent = Subscription::default();
        let child = Subscription::default();
        child.add(TeardownLogic::fallible(|| Err(RxError::msg("child"))));
        parent.add(child);
        parent.add(TeardownLogic::fallible(|| Err(RxError::msg("parent"))));

        let err = parent.unsubscribe().unwrap_err();
        let messages: Vec<String> = err.errors().iter().map(ToString::to_string).collect();
        assert_eq!(messages, vec!["child", "parent"]);
    }

    #[test]
    fn add_to_closed_runs_immediately() {
        let (count, f) = counter();
        let s = Subscription::closed();

        assert!(s.add(TeardownLogic::logic(f)).is_none());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn adding_self_is_ignored() {
        let s = Subscription::default();
        assert!(s.add(s.clone()).is_none());
        assert!(s.is_empty());
        assert!(s.unsubscribe().is_ok());
    }

    #[test]
    fn child_released_alone_leaves_parent() {
        let parent = Subscription::default();
        let child = Subscription::default();
        parent.add(child.clone());
        assert_eq!(parent.len(), 1);

        child.unsubscribe().unwrap();
        assert!(parent.is_empty());
        assert!(!parent.is_closed());
    }

    #[test]
    fn parent_release_releases_children() {
        let (count, f) = counter();
        let parent = Subscription::default();
        let child = Subscription::new(f);
        parent.add(child.clone());

        parent.unsubscribe().unwrap();
        assert!(child.is_closed());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn removed_entries_never_run() {
        let (count, f) = counter();
        let s = Subscription::default();
        let id = s.add(TeardownLogic::logic(f)).unwrap();
        let child = Subscription::default();
        s.add(child.clone());

        s.remove(id);
        s.remove_child(&child);
        s.unsubscribe().unwrap();

        assert_eq!(count.get(), 0);
        assert!(!child.is_closed());
    }
}
