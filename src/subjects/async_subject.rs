use std::{cell::RefCell, rc::Rc};

use super::{Registry, SubjectState};
use crate::{
    errors::{RxError, UnsubscriptionError},
    observer::Observer,
    subscription::subscribe::{Subscribeable, Subscriber, Subscription, Unsubscribeable},
    Observable, ObservableExt,
};

/// A specialized `Subject` variant that emits its latest value to observers upon
/// completion.
///
/// `AsyncSubject` remembers the last value it was given but keeps it to itself
/// until `complete` is called. Every registered observer then receives that value
/// once, followed by the completion. Observers that subscribe later receive the
/// same value and completion right away.
///
/// An error discards the stored value. Existing and later observers only receive
/// the error.
///
/// # Examples
///
/// AsyncSubject completion
///
///```no_run
/// use rxpush::{subjects::AsyncSubject, subscribe::Subscriber};
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
/// let (mut emitter, receiver) = AsyncSubject::emitter_receiver();
///
/// let _ = receiver.subscribe(create_subscriber(1));
///
/// emitter.next(101); // Stores 101 as the latest value.
/// emitter.next(102); // Latest value is now 102.
///
/// let _ = receiver
///     .clone()
///     .map(|v| format!("mapped {}", v))
///     .subscribe(Subscriber::new(
///         move |v| println!("Subscriber #2 emitted: {}", v),
///         |_| eprintln!("Error"),
///         || println!("Completed 2"),
///     ));
///
/// // Emits 102 to `Subscriber`'s 1 and 2 and completes them.
/// emitter.complete();
///
/// // Post-completion subscribe, emits 102 and completes.
/// let _ = receiver.subscribe(create_subscriber(3));
///```
pub struct AsyncSubject<T> {
    value: Option<T>,
    registry: Registry<T>,
}

impl<T: 'static> SubjectState for AsyncSubject<T> {
    type Item = T;

    fn registry(&mut self) -> &mut Registry<T> {
        &mut self.registry
    }
}

impl<T: Clone + 'static> AsyncSubject<T> {
    /// Creates a new pair of `AsyncSubjectEmitter` for emitting values and
    /// `AsyncSubjectReceiver` for subscribing to values.
    pub fn emitter_receiver() -> (AsyncSubjectEmitter<T>, AsyncSubjectReceiver<T>) {
        let s = Rc::new(RefCell::new(AsyncSubject {
            value: None,
            registry: Registry::new(),
        }));

        (AsyncSubjectEmitter(Rc::clone(&s)), AsyncSubjectReceiver(s))
    }
}

/// Subscription handler for `AsyncSubject`.
#[derive(Clone)]
pub struct AsyncSubjectReceiver<T>(Rc<RefCell<AsyncSubject<T>>>);

/// Multicasting emitter for `AsyncSubject`.
#[derive(Clone)]
pub struct AsyncSubjectEmitter<T>(Rc<RefCell<AsyncSubject<T>>>);

impl<T: Clone + 'static> AsyncSubjectReceiver<T> {
    /// Returns the number of registered observers.
    pub fn len(&self) -> usize {
        super::len(&self.0)
    }

    /// Returns `true` if no observers are registered, `false` otherwise.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + 'static> Subscribeable for AsyncSubjectReceiver<T> {
    type ObsType = T;

    fn subscribe(&self, v: Subscriber<Self::ObsType>) -> Result<Subscription, RxError> {
        let last = {
            let src = self.0.borrow();
            if src.registry.completed() {
                src.value.clone()
            } else {
                None
            }
        };
        super::register(&self.0, v, last.into_iter().collect())
    }
}

impl<T: Clone + 'static> Unsubscribeable for AsyncSubjectReceiver<T> {
    fn unsubscribe(&self) -> Result<(), UnsubscriptionError> {
        super::close(&self.0)
    }

    fn is_closed(&self) -> bool {
        self.0.borrow().registry.is_closed()
    }
}

impl<T: Clone> Observer for AsyncSubjectEmitter<T> {
    type NextFnType = T;

    fn next(&mut self, v: Self::NextFnType) {
        let mut src = self.0.borrow_mut();
        if src.registry.is_active() {
            src.value = Some(v);
        }
    }

    fn error(&mut self, e: RxError) {
        let (observers, discarded) = {
            let mut src = self.0.borrow_mut();
            if !src.registry.is_active() {
                return;
            }
            let observers = src.registry.latch_error(e.clone());
            (observers, src.value.take())
        };
        drop(discarded);
        super::error_all(observers, e);
    }

    fn complete(&mut self) {
        let (observers, last) = {
            let mut src = self.0.borrow_mut();
            let observers = src.registry.latch_complete();
            (observers, src.value.clone())
        };
        for mut o in observers {
            if let Some(last) = &last {
                o.next(last.clone());
            }
            o.complete();
        }
    }
}

impl<T: Clone + 'static> From<AsyncSubjectEmitter<T>> for Subscriber<T> {
    fn from(value: AsyncSubjectEmitter<T>) -> Self {
        Subscriber::from_observer(value)
    }
}

impl<T: Clone + 'static> From<AsyncSubjectReceiver<T>> for Observable<T> {
    fn from(value: AsyncSubjectReceiver<T>) -> Self {
        value.into_observable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_discards_stored_value() {
        let (mut emitter, receiver) = AsyncSubject::<i32>::emitter_receiver();
        emitter.next(1);
        emitter.error(RxError::msg("boom"));
        emitter.complete();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let errors = Rc::new(RefCell::new(0));
        let (s, e) = (Rc::clone(&seen), Rc::clone(&errors));
        receiver
            .subscribe(Subscriber::new(
                move |v| s.borrow_mut().push(v),
                move |_| *e.borrow_mut() += 1,
                || {},
            ))
            .unwrap();

        assert!(seen.borrow().is_empty());
        assert_eq!(*errors.borrow(), 1);
        assert!(emitter.0.borrow().value.is_none());
    }

    #[test]
    fn completion_without_value_only_completes() {
        let (mut emitter, receiver) = AsyncSubject::<i32>::emitter_receiver();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2) = (Rc::clone(&log), Rc::clone(&log));
        receiver
            .subscribe(Subscriber::new(
                move |v: i32| l1.borrow_mut().push(v.to_string()),
                |_| {},
                move || l2.borrow_mut().push("done".to_string()),
            ))
            .unwrap();

        emitter.complete();

        assert_eq!(*log.borrow(), vec!["done"]);
    }
}
