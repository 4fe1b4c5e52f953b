//! The `subjects` module provides various types of subjects for handling and observing
//! data streams. Subjects serve both as observers and observables, allowing multiple
//! observers to subscribe to a single source and receive the same values.
//!
//! Subjects are split into emitter and receiver using the `emitter_receiver`
//! function.
//!
//! The `Subject` emitter behaves as an `Observer`, enabling `next()`, `error()` and
//! `complete()` calls. This also allows the `Subject` emitter to be passed as a
//! parameter to the `subscribe` method of another `Observable`.
//!
//! The `Subject` receiver functions as an `Observable`, enabling you to use the
//! `subscribe` and `unsubscribe` methods on it.
//!
//! There are four specialized varieties of `Subject`, each tailored for particular use
//! cases: `ReplaySubject`, `BehaviorSubject`, `AsyncSubject` and the basic `Subject`.
//! These varieties provide specific functionalities like caching previous values,
//! emitting the most recent or last value, or serving as a simple subject for direct
//! value pushing.

mod async_subject;
mod behavior_subject;
mod replay_subject;
mod subject;

pub use async_subject::*;
pub use behavior_subject::*;
pub use replay_subject::*;
pub use subject::*;

use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::{Rc, Weak},
};

use crate::{
    errors::{ObservableError, RxError, Turn, UnsubscriptionError},
    observer::Observer,
    subscription::subscribe::{Subscriber, Subscription, TeardownLogic},
};

// Observers of a subject plus its terminal state. Keys grow monotonically, so
// iteration order is subscription order.
pub(crate) struct Registry<T> {
    observers: BTreeMap<u64, Subscriber<T>>,
    next_key: u64,
    error: Option<RxError>,
    completed: bool,
    closed: bool,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Registry {
            observers: BTreeMap::new(),
            next_key: 0,
            error: None,
            completed: false,
            closed: false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    /// Neither terminated nor closed.
    pub(crate) fn is_active(&self) -> bool {
        !self.completed && self.error.is_none() && !self.closed
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn completed(&self) -> bool {
        self.completed
    }

    pub(crate) fn snapshot(&self) -> Vec<Subscriber<T>> {
        if !self.is_active() {
            return Vec::new();
        }
        self.observers.values().cloned().collect()
    }

    pub(crate) fn latch_error(&mut self, e: RxError) -> Vec<Subscriber<T>> {
        if !self.is_active() {
            return Vec::new();
        }
        tracing::trace!(observers = self.observers.len(), error = %e, "subject errored");
        self.error = Some(e);
        self.drain()
    }

    pub(crate) fn latch_complete(&mut self) -> Vec<Subscriber<T>> {
        if !self.is_active() {
            return Vec::new();
        }
        tracing::trace!(observers = self.observers.len(), "subject completed");
        self.completed = true;
        self.drain()
    }

    fn close(&mut self) -> Vec<Subscriber<T>> {
        self.closed = true;
        self.drain()
    }

    fn drain(&mut self) -> Vec<Subscriber<T>> {
        std::mem::take(&mut self.observers).into_values().collect()
    }
}

pub(crate) trait SubjectState: 'static {
    type Item: 'static;

    fn registry(&mut self) -> &mut Registry<Self::Item>;
}

enum Admission {
    Closed,
    Errored(RxError),
    Completed,
    Registered(u64),
}

/// Registers `subscriber` with an active subject, or replays the terminal signal
/// of a finished one.
///
/// `replay` reaches the subscriber first. On an active subject the subscriber is
/// registered before the replay starts, so values emitted from inside the replay
/// are queued behind it instead of being missed.
pub(crate) fn register<S: SubjectState>(
    state: &Rc<RefCell<S>>,
    mut subscriber: Subscriber<S::Item>,
    replay: Vec<S::Item>,
) -> Result<Subscription, RxError> {
    let _turn = Turn::enter();
    let admission = {
        let mut st = state.borrow_mut();
        let registry = st.registry();
        if registry.closed {
            Admission::Closed
        } else if let Some(e) = &registry.error {
            Admission::Errored(e.clone())
        } else if registry.completed {
            Admission::Completed
        } else if subscriber.is_stopped() {
            return Ok(subscriber.subscription());
        } else {
            let key = registry.next_key;
            registry.next_key += 1;
            registry.observers.insert(key, subscriber.clone());
            Admission::Registered(key)
        }
    };

    match admission {
        Admission::Closed => Err(ObservableError::SubjectClosed.into()),
        Admission::Errored(e) => {
            subscriber.replay(replay);
            subscriber.error(e);
            Ok(subscriber.subscription())
        }
        Admission::Completed => {
            subscriber.replay(replay);
            subscriber.complete();
            Ok(subscriber.subscription())
        }
        Admission::Registered(key) => {
            let weak: Weak<RefCell<S>> = Rc::downgrade(state);
            subscriber.add(TeardownLogic::logic(move || {
                if let Some(state) = weak.upgrade() {
                    let removed = state.borrow_mut().registry().observers.remove(&key);
                    drop(removed);
                }
            }));
            subscriber.replay(replay);
            Ok(subscriber.subscription())
        }
    }
}

pub(crate) fn len<S: SubjectState>(state: &Rc<RefCell<S>>) -> usize {
    state.borrow_mut().registry().len()
}

/// Closes the subject and unsubscribes every registered observer.
pub(crate) fn close<S: SubjectState>(state: &Rc<RefCell<S>>) -> Result<(), UnsubscriptionError> {
    let _turn = Turn::enter();
    let observers = state.borrow_mut().registry().close();
    let mut errors = Vec::new();
    for o in observers {
        if let Err(e) = o.unsubscribe() {
            errors.extend(e.into_errors());
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(UnsubscriptionError::new(errors))
    }
}

pub(crate) fn next_all<T: Clone>(observers: Vec<Subscriber<T>>, v: T) {
    let _turn = Turn::enter();
    for mut o in observers {
        o.next(v.clone());
    }
}

pub(crate) fn error_all<T>(observers: Vec<Subscriber<T>>, e: RxError) {
    let _turn = Turn::enter();
    for mut o in observers {
        o.error(e.clone());
    }
}

pub(crate) fn complete_all<T>(observers: Vec<Subscriber<T>>) {
    let _turn = Turn::enter();
    for mut o in observers {
        o.complete();
    }
}
