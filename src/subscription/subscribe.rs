use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use crate::{
    errors::{report_unhandled, RxError, Turn, UnsubscriptionError},
    observer::Observer,
};

pub use super::teardown::{Subscription, TeardownId, TeardownLogic};

/// A trait for types that can be subscribed to, allowing consumers to receive
/// values emitted by an observable stream.
pub trait Subscribeable {
    /// The type of items emitted by the observable stream.
    type ObsType;

    /// Subscribes to the observable stream and specifies how to handle emitted values.
    ///
    /// The `Subscriber` parameter defines the behavior for processing values emitted
    /// by the observable stream. Values emitted synchronously by the producer are
    /// delivered before this method returns.
    ///
    /// # Arguments
    ///
    /// - `s`: A `Subscriber` that handles emitted values and other events from
    ///        the observable stream.
    ///
    /// # Returns
    ///
    /// The `Subscription` of `s`, or the error the producer failed with while
    /// setting the subscription up.
    fn subscribe(&self, s: Subscriber<Self::ObsType>) -> Result<Subscription, RxError>;
}

/// A trait for types that can be unsubscribed, allowing the clean release of resources
/// associated with a subscription.
pub trait Unsubscribeable {
    /// Releases the resources held by the subscription and stops further delivery.
    ///
    /// Calling it again has no effect. Failures of individual teardown actions are
    /// gathered into the returned `UnsubscriptionError`.
    fn unsubscribe(&self) -> Result<(), UnsubscriptionError>;

    fn is_closed(&self) -> bool;
}

impl Unsubscribeable for Subscription {
    fn unsubscribe(&self) -> Result<(), UnsubscriptionError> {
        Subscription::unsubscribe(self)
    }

    fn is_closed(&self) -> bool {
        Subscription::is_closed(self)
    }
}

type NextFn<T> = Box<dyn FnMut(T) -> Result<(), RxError>>;
type ErrorFn = Box<dyn FnMut(RxError) -> Result<(), RxError>>;
type CompleteFn = Box<dyn FnMut() -> Result<(), RxError>>;

// Partial callback set. Missing handlers are legal; failing ones are rerouted.
struct SafeObserver<T> {
    next_fn: Option<NextFn<T>>,
    error_fn: Option<ErrorFn>,
    complete_fn: Option<CompleteFn>,
}

impl<T> SafeObserver<T> {
    fn next(&mut self, v: T) -> Result<(), RxError> {
        match &mut self.next_fn {
            Some(next_fn) => next_fn(v),
            None => Ok(()),
        }
    }

    fn error(&mut self, e: RxError) {
        match &mut self.error_fn {
            Some(error_fn) => {
                if let Err(failure) = error_fn(e) {
                    report_unhandled(failure);
                }
            }
            None => report_unhandled(e),
        }
    }

    fn complete(&mut self) {
        if let Some(complete_fn) = &mut self.complete_fn {
            if let Err(e) = complete_fn() {
                self.error(e);
            }
        }
    }
}

enum Destination<T> {
    Callbacks(SafeObserver<T>),
    Observer(Box<dyn Observer<NextFnType = T>>),
}

impl<T> Destination<T> {
    // Returns `true` once the destination has received its terminal signal.
    fn dispatch(&mut self, signal: Signal<T>) -> bool {
        match self {
            Destination::Callbacks(cb) => match signal {
                Signal::Next(v) => match cb.next(v) {
                    Ok(()) => false,
                    Err(e) => {
                        cb.error(e);
                        true
                    }
                },
                Signal::Error(e) => {
                    cb.error(e);
                    true
                }
                Signal::Complete => {
                    cb.complete();
                    true
                }
            },
            Destination::Observer(o) => match signal {
                Signal::Next(v) => {
                    o.next(v);
                    false
                }
                Signal::Error(e) => {
                    o.error(e);
                    true
                }
                Signal::Complete => {
                    o.complete();
                    true
                }
            },
        }
    }

    fn callbacks(&mut self) -> Option<&mut SafeObserver<T>> {
        match self {
            Destination::Callbacks(cb) => Some(cb),
            Destination::Observer(_) => None,
        }
    }
}

enum Signal<T> {
    Next(T),
    Error(RxError),
    Complete,
}

struct SubscriberCore<T> {
    destination: RefCell<Destination<T>>,
    stopped: Cell<bool>,
    delivering: Cell<bool>,
    pending: RefCell<VecDeque<Signal<T>>>,
    subscription: Subscription,
}

/// A type that acts as an observer, allowing users to handle emitted values, errors,
/// and completion when subscribing to an `Observable` or `Subject`.
///
/// Users can create a `Subscriber` instance using the `new` method and provide
/// custom functions to handle the `next`, `error`, and `complete` events, or start
/// from `on_next` and add the other handlers afterwards.
///
/// A `Subscriber` owns a [`Subscription`]. Once an error or completion has been
/// delivered, or once the subscription is released, the subscriber is stopped and
/// every further signal is dropped. Clones share the same state, so a producer can
/// hand copies of its subscriber to timers or callbacks.
pub struct Subscriber<NextFnType>(Rc<SubscriberCore<NextFnType>>);

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Subscriber(Rc::clone(&self.0))
    }
}

impl<NextFnType: 'static> Subscriber<NextFnType> {
    /// Creates a new `Subscriber` instance with custom handling functions for emitted
    /// values, errors, and completion.
    pub fn new(
        mut next_fn: impl FnMut(NextFnType) + 'static,
        mut error_fn: impl FnMut(RxError) + 'static,
        mut complete_fn: impl FnMut() + 'static,
    ) -> Self {
        Self::with_destination(Destination::Callbacks(SafeObserver {
            next_fn: Some(Box::new(move |v| {
                next_fn(v);
                Ok(())
            })),
            error_fn: Some(Box::new(move |e| {
                error_fn(e);
                Ok(())
            })),
            complete_fn: Some(Box::new(move || {
                complete_fn();
                Ok(())
            })),
        }))
    }

    /// Create a new Subscriber with the provided `next` function.
    ///
    /// Errors reaching a subscriber without an error handler are reported to the
    /// unhandled-error handler.
    pub fn on_next(mut next_fn: impl FnMut(NextFnType) + 'static) -> Self {
        Self::try_on_next(move |v| {
            next_fn(v);
            Ok(())
        })
    }

    /// Create a new Subscriber whose `next` function may fail.
    ///
    /// A failure stops the subscriber and is handed to its error handler.
    pub fn try_on_next(next_fn: impl FnMut(NextFnType) -> Result<(), RxError> + 'static) -> Self {
        Self::with_destination(Destination::Callbacks(SafeObserver {
            next_fn: Some(Box::new(next_fn)),
            error_fn: None,
            complete_fn: None,
        }))
    }

    /// Wraps any `Observer` so it can be passed to `subscribe`.
    pub fn from_observer(observer: impl Observer<NextFnType = NextFnType> + 'static) -> Self {
        Self::with_destination(Destination::Observer(Box::new(observer)))
    }

    fn with_destination(destination: Destination<NextFnType>) -> Self {
        Subscriber(Rc::new(SubscriberCore {
            destination: RefCell::new(destination),
            stopped: Cell::new(false),
            delivering: Cell::new(false),
            pending: RefCell::new(VecDeque::new()),
            subscription: Subscription::default(),
        }))
    }

    /// Set the completion function for the Subscriber.
    ///
    /// Has no effect on a subscriber built with `from_observer`.
    pub fn on_complete(&mut self, mut complete_fn: impl FnMut() + 'static) {
        self.with_try_complete(move || {
            complete_fn();
            Ok(())
        });
    }

    /// Set the error-handling function for the Subscriber.
    ///
    /// Has no effect on a subscriber built with `from_observer`.
    pub fn on_error(&mut self, mut error_fn: impl FnMut(RxError) + 'static) {
        self.with_try_error(move |e| {
            error_fn(e);
            Ok(())
        });
    }

    /// Set a completion function that may fail; a failure goes to the error handler.
    pub fn with_try_complete(&mut self, complete_fn: impl FnMut() -> Result<(), RxError> + 'static) {
        if let Some(cb) = self.0.destination.borrow_mut().callbacks() {
            cb.complete_fn = Some(Box::new(complete_fn));
        }
    }

    /// Set an error handler that may fail; a failure goes to the unhandled-error
    /// handler.
    pub fn with_try_error(&mut self, error_fn: impl FnMut(RxError) -> Result<(), RxError> + 'static) {
        if let Some(cb) = self.0.destination.borrow_mut().callbacks() {
            cb.error_fn = Some(Box::new(error_fn));
        }
    }
}

impl<T> Subscriber<T> {
    /// Returns `true` once the subscriber accepts no more signals, either because
    /// it was terminated or because its subscription was released.
    ///
    /// Synchronous producers should check this between emissions.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.stopped.get() || self.0.subscription.is_closed()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.0.subscription.is_closed()
    }

    /// A handle to the subscription owned by this subscriber.
    #[must_use]
    pub fn subscription(&self) -> Subscription {
        self.0.subscription.clone()
    }

    /// Attaches `teardown` to this subscriber's subscription.
    pub fn add(&self, teardown: impl Into<TeardownLogic>) -> Option<TeardownId> {
        self.0.subscription.add(teardown)
    }

    /// Stops the subscriber and releases its subscription.
    pub fn unsubscribe(&self) -> Result<(), UnsubscriptionError> {
        self.0.stopped.set(true);
        self.0.subscription.unsubscribe()
    }

    pub(crate) fn release(&self) {
        self.0.stopped.set(true);
        self.0.subscription.release();
    }

    /// Delivers `values` ahead of anything emitted to this subscriber while they
    /// are being delivered.
    pub(crate) fn replay(&self, values: Vec<T>) {
        if values.is_empty() || self.is_stopped() {
            return;
        }
        self.deliver(values.into_iter().map(Signal::Next));
    }

    fn deliver(&self, signals: impl IntoIterator<Item = Signal<T>>) {
        let core = &self.0;
        core.pending.borrow_mut().extend(signals);
        if core.delivering.replace(true) {
            // Re-entrant signal; the outer call drains it after the current callback.
            return;
        }
        let _turn = Turn::enter();

        loop {
            let signal = core.pending.borrow_mut().pop_front();
            let Some(signal) = signal else {
                break;
            };
            if core.subscription.is_closed() {
                let dropped = std::mem::take(&mut *core.pending.borrow_mut());
                tracing::trace!(dropped = dropped.len() + 1, "signals dropped: subscriber released");
                drop(signal);
                drop(dropped);
                break;
            }

            let terminated = core.destination.borrow_mut().dispatch(signal);
            if terminated {
                core.stopped.set(true);
                core.subscription.release();
            }
        }
        core.delivering.set(false);
    }
}

impl<T> Observer for Subscriber<T> {
    type NextFnType = T;

    fn next(&mut self, v: Self::NextFnType) {
        if self.is_stopped() {
            tracing::trace!("next dropped: subscriber stopped");
            return;
        }
        self.deliver(Some(Signal::Next(v)));
    }

    fn complete(&mut self) {
        if self.is_stopped() {
            tracing::trace!("complete dropped: subscriber stopped");
            return;
        }
        self.0.stopped.set(true);
        self.deliver(Some(Signal::Complete));
    }

    fn error(&mut self, e: RxError) {
        if self.is_stopped() {
            tracing::trace!(error = %e, "error dropped: subscriber stopped");
            return;
        }
        self.0.stopped.set(true);
        self.deliver(Some(Signal::Error(e)));
    }
}

impl<T> Unsubscribeable for Subscriber<T> {
    fn unsubscribe(&self) -> Result<(), UnsubscriptionError> {
        Subscriber::unsubscribe(self)
    }

    fn is_closed(&self) -> bool {
        Subscriber::is_closed(self)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::errors::{reset_unhandled_error_handler, set_unhandled_error_handler};

    type Log = Rc<RefCell<Vec<String>>>;

    fn logging_subscriber(log: &Log) -> Subscriber<i32> {
        let (n, e, c) = (Rc::clone(log), Rc::clone(log), Rc::clone(log));
        Subscriber::new(
            move |v| n.borrow_mut().push(format!("next {}", v)),
            move |err| e.borrow_mut().push(format!("error {}", err)),
            move || c.borrow_mut().push("complete".to_string()),
        )
    }

    #[test]
    fn nothing_after_complete() {
        let log = Log::default();
        let mut s = logging_subscriber(&log);

        s.next(1);
        s.complete();
        s.next(2);
        s.error(RxError::msg("late"));
        s.complete();

        assert_eq!(*log.borrow(), vec!["next 1", "complete"]);
        assert!(s.is_closed());
    }

    #[test]
    fn terminal_signal_releases_subscription() {
        let log = Log::default();
        let mut s = logging_subscriber(&log);
        let released = Rc::new(Cell::new(false));
        let r = Rc::clone(&released);
        s.add(TeardownLogic::logic(move || r.set(true)));

        s.error(RxError::msg("boom"));

        assert!(released.get());
        assert_eq!(*log.borrow(), vec!["error boom"]);
    }

    #[test]
    fn unsubscribed_subscriber_drops_values() {
        let log = Log::default();
        let mut s = logging_subscriber(&log);

        s.unsubscribe().unwrap();
        s.next(1);
        s.complete();

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn reentrant_signals_are_delivered_in_order() {
        let log = Log::default();
        let slot: Rc<RefCell<Option<Subscriber<i32>>>> = Rc::default();
        let (l, sl) = (Rc::clone(&log), Rc::clone(&slot));
        let s = Subscriber::on_next(move |v: i32| {
            l.borrow_mut().push(format!("enter {}", v));
            if v == 1 {
                let inner = sl.borrow().clone();
                if let Some(mut inner) = inner {
                    inner.next(2);
                }
            }
            l.borrow_mut().push(format!("leave {}", v));
        });
        *slot.borrow_mut() = Some(s.clone());

        let mut s = s;
        s.next(1);
        slot.borrow_mut().take();

        assert_eq!(
            *log.borrow(),
            vec!["enter 1", "leave 1", "enter 2", "leave 2"]
        );
    }

    #[test]
    fn unsubscribing_from_callback_stops_queued_values() {
        let log = Log::default();
        let slot: Rc<RefCell<Option<Subscriber<i32>>>> = Rc::default();
        let (l, sl) = (Rc::clone(&log), Rc::clone(&slot));
        let s = Subscriber::on_next(move |v: i32| {
            l.borrow_mut().push(format!("next {}", v));
            let me = sl.borrow().clone();
            if let Some(mut me) = me {
                me.next(v + 10);
                me.unsubscribe().unwrap();
            }
        });
        *slot.borrow_mut() = Some(s.clone());

        let mut s = s;
        s.next(1);
        slot.borrow_mut().take();

        assert_eq!(*log.borrow(), vec!["next 1"]);
    }

    #[test]
    fn failing_next_routes_to_error_handler() {
        let log = Log::default();
        let (n, e) = (Rc::clone(&log), Rc::clone(&log));
        let mut s = Subscriber::try_on_next(move |v: i32| {
            if v > 1 {
                return Err(RxError::msg("too big"));
            }
            n.borrow_mut().push(format!("next {}", v));
            Ok(())
        });
        s.on_error(move |err| e.borrow_mut().push(format!("error {}", err)));

        s.next(1);
        s.next(2);
        s.next(3);

        assert_eq!(*log.borrow(), vec!["next 1", "error too big"]);
        assert!(s.is_stopped());
    }

    #[test]
    fn failing_complete_routes_to_error_handler() {
        let log = Log::default();
        let e = Rc::clone(&log);
        let mut s = Subscriber::on_next(|_: i32| {});
        s.with_try_complete(|| Err(RxError::msg("cannot finish")));
        s.on_error(move |err| e.borrow_mut().push(format!("error {}", err)));

        s.complete();

        assert_eq!(*log.borrow(), vec!["error cannot finish"]);
    }

    #[test]
    fn missing_error_handler_reports_unhandled() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s2 = Rc::clone(&seen);
        set_unhandled_error_handler(move |e| s2.borrow_mut().push(e.to_string()));

        let mut s = Subscriber::on_next(|_: i32| {});
        {
            let _producer = Turn::enter();
            s.error(RxError::msg("nobody listens"));
            assert!(seen.borrow().is_empty());
        }

        reset_unhandled_error_handler();
        assert_eq!(*seen.borrow(), vec!["nobody listens"]);
    }

    #[test]
    fn failing_error_handler_reports_unhandled() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s2 = Rc::clone(&seen);
        set_unhandled_error_handler(move |e| s2.borrow_mut().push(e.to_string()));

        let mut s = Subscriber::on_next(|_: i32| {});
        s.with_try_error(|_| Err(RxError::msg("handler failed")));
        {
            let _producer = Turn::enter();
            s.error(RxError::msg("original"));
            assert!(seen.borrow().is_empty());
        }

        reset_unhandled_error_handler();
        assert_eq!(*seen.borrow(), vec!["handler failed"]);
    }

    struct Collect(Log);

    impl Observer for Collect {
        type NextFnType = i32;

        fn next(&mut self, v: i32) {
            self.0.borrow_mut().push(format!("next {}", v));
        }

        fn complete(&mut self) {
            self.0.borrow_mut().push("complete".to_string());
        }

        fn error(&mut self, e: RxError) {
            self.0.borrow_mut().push(format!("error {}", e));
        }
    }

    #[test]
    fn from_observer_forwards_everything_once() {
        let log = Log::default();
        let mut s = Subscriber::from_observer(Collect(Rc::clone(&log)));

        s.next(4);
        s.complete();
        s.complete();

        assert_eq!(*log.borrow(), vec!["next 4", "complete"]);
    }
}
