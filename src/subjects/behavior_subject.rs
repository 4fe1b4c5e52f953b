use std::{cell::RefCell, rc::Rc};

use super::{Registry, SubjectState};
use crate::{
    errors::{RxError, UnsubscriptionError},
    observer::Observer,
    subscription::subscribe::{Subscribeable, Subscriber, Subscription, Unsubscribeable},
    Observable, ObservableExt,
};

/// `BehaviorSubject` holds a current value and hands it to every new subscriber
/// as soon as it subscribes.
///
/// It starts with the value given to `emitter_receiver`, and each `next` replaces
/// it before broadcasting. After an error or completion new subscribers receive
/// only the terminal notification.
///
/// # Examples
///
///```no_run
/// use rxpush::{subjects::BehaviorSubject, subscribe::Subscriber};
/// use rxpush::{Observer, Subscribeable};
///
/// let (mut emitter, receiver) = BehaviorSubject::emitter_receiver(100);
///
/// // Receives 100 right away.
/// let _ = receiver.subscribe(Subscriber::on_next(|v| println!("first: {}", v)));
///
/// emitter.next(101);
///
/// // Receives 101 right away, then every later value.
/// let _ = receiver.subscribe(Subscriber::on_next(|v| println!("second: {}", v)));
///
/// emitter.next(102);
/// assert_eq!(receiver.value(), 102);
///```
pub struct BehaviorSubject<T> {
    value: T,
    registry: Registry<T>,
}

impl<T: 'static> SubjectState for BehaviorSubject<T> {
    type Item = T;

    fn registry(&mut self) -> &mut Registry<T> {
        &mut self.registry
    }
}

impl<T: Clone + 'static> BehaviorSubject<T> {
    /// Creates a `BehaviorSubject` holding `value` and returns its emitter and
    /// receiver.
    pub fn emitter_receiver(value: T) -> (BehaviorSubjectEmitter<T>, BehaviorSubjectReceiver<T>) {
        let s = Rc::new(RefCell::new(BehaviorSubject {
            value,
            registry: Registry::new(),
        }));

        (
            BehaviorSubjectEmitter(Rc::clone(&s)),
            BehaviorSubjectReceiver(s),
        )
    }
}

/// Subscription handler for `BehaviorSubject`.
#[derive(Clone)]
pub struct BehaviorSubjectReceiver<T>(Rc<RefCell<BehaviorSubject<T>>>);

/// Multicasting emitter for `BehaviorSubject`.
#[derive(Clone)]
pub struct BehaviorSubjectEmitter<T>(Rc<RefCell<BehaviorSubject<T>>>);

impl<T: Clone + 'static> BehaviorSubjectReceiver<T> {
    /// Returns the number of registered observers.
    pub fn len(&self) -> usize {
        super::len(&self.0)
    }

    /// Returns `true` if no observers are registered, `false` otherwise.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current value.
    pub fn value(&self) -> T {
        self.0.borrow().value.clone()
    }
}

impl<T: Clone + 'static> Subscribeable for BehaviorSubjectReceiver<T> {
    type ObsType = T;

    fn subscribe(&self, v: Subscriber<Self::ObsType>) -> Result<Subscription, RxError> {
        let current = {
            let src = self.0.borrow();
            src.registry.is_active().then(|| src.value.clone())
        };
        super::register(&self.0, v, current.into_iter().collect())
    }
}

impl<T: Clone + 'static> Unsubscribeable for BehaviorSubjectReceiver<T> {
    fn unsubscribe(&self) -> Result<(), UnsubscriptionError> {
        super::close(&self.0)
    }

    fn is_closed(&self) -> bool {
        self.0.borrow().registry.is_closed()
    }
}

impl<T: Clone> Observer for BehaviorSubjectEmitter<T> {
    type NextFnType = T;

    fn next(&mut self, v: Self::NextFnType) {
        let observers = {
            let mut src = self.0.borrow_mut();
            if !src.registry.is_active() {
                return;
            }
            src.value = v.clone();
            src.registry.snapshot()
        };
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

impl<T: Clone + 'static> From<BehaviorSubjectEmitter<T>> for Subscriber<T> {
    fn from(value: BehaviorSubjectEmitter<T>) -> Self {
        Subscriber::from_observer(value)
    }
}

impl<T: Clone + 'static> From<BehaviorSubjectReceiver<T>> for Observable<T> {
    fn from(value: BehaviorSubjectReceiver<T>) -> Self {
        value.into_observable()
    }
}
