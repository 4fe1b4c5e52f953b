use std::{rc::Rc, time::Duration};

use super::Observable;
use crate::{
    errors::RxError,
    observer::Observer,
    scheduler::{self, Scheduler},
    subscription::subscribe::{Subscriber, TeardownLogic},
};

/// Emits `initial`, then `step(&previous)`, for as long as `condition` holds,
/// then completes.
///
/// Emission is synchronous; the loop stops early once the subscriber is stopped,
/// so `generate` can be combined with `take` even when `condition` never fails.
pub fn generate<T, C, S>(initial: T, condition: C, step: S) -> Observable<T>
where
    T: Clone + 'static,
    C: Fn(&T) -> bool + 'static,
    S: Fn(&T) -> T + 'static,
{
    Observable::new(move |mut o: Subscriber<T>| {
        let mut state = initial.clone();
        while !o.is_stopped() && condition(&state) {
            o.next(state.clone());
            if o.is_stopped() {
                break;
            }
            state = step(&state);
        }
        o.complete();
        TeardownLogic::Nil
    })
}

/// Emits `0` after `num_of_ms` milliseconds on the default scheduler, then
/// completes.
pub fn timer(num_of_ms: u64) -> Observable<u64> {
    timer_on(num_of_ms, scheduler::default_scheduler())
}

/// Emits `0` after `num_of_ms` milliseconds on `scheduler`, then completes.
///
/// Unsubscribing before the timer fires cancels it.
pub fn timer_on(num_of_ms: u64, scheduler: Rc<dyn Scheduler>) -> Observable<u64> {
    let delay = Duration::from_millis(num_of_ms);
    Observable::new(move |mut o: Subscriber<u64>| {
        let task = scheduler.schedule(
            delay,
            Box::new(move || {
                o.next(0);
                o.complete();
            }),
        );
        TeardownLogic::Wrapped(task)
    })
}

/// Emits every item of `iter`, then completes. Each subscription iterates a
/// fresh clone of `iter`.
pub fn from_iter<I>(iter: I) -> Observable<I::Item>
where
    I: IntoIterator + Clone + 'static,
    I::Item: 'static,
{
    Observable::new(move |mut o: Subscriber<I::Item>| {
        for v in iter.clone() {
            if o.is_stopped() {
                break;
            }
            o.next(v);
        }
        o.complete();
        TeardownLogic::Nil
    })
}

/// Emits `value` once, then completes.
pub fn of<T: Clone + 'static>(value: T) -> Observable<T> {
    Observable::new(move |mut o: Subscriber<T>| {
        o.next(value.clone());
        o.complete();
        TeardownLogic::Nil
    })
}

/// Completes immediately without emitting.
pub fn empty<T: 'static>() -> Observable<T> {
    Observable::new(|mut o: Subscriber<T>| {
        o.complete();
        TeardownLogic::Nil
    })
}

/// Errors immediately with `error`. Every subscriber receives the same error
/// instance.
pub fn throw_error<T: 'static>(error: impl Into<RxError>) -> Observable<T> {
    let error = error.into();
    Observable::new(move |mut o: Subscriber<T>| {
        o.error(error.clone());
        TeardownLogic::Nil
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::{scheduler::TestScheduler, Subscribeable};

    fn record<T: 'static>(log: &Rc<RefCell<Vec<String>>>) -> Subscriber<T>
    where
        T: std::fmt::Debug,
    {
        let (n, e, c) = (Rc::clone(log), Rc::clone(log), Rc::clone(log));
        Subscriber::new(
            move |v| n.borrow_mut().push(format!("{:?}", v)),
            move |err| e.borrow_mut().push(format!("error {}", err)),
            move || c.borrow_mut().push("complete".to_string()),
        )
    }

    #[test]
    fn generate_stops_when_condition_fails() {
        let log = Rc::new(RefCell::new(Vec::new()));
        generate(1, |v| *v < 20, |v| v * 3)
            .subscribe(record(&log))
            .unwrap();
        assert_eq!(*log.borrow(), vec!["1", "3", "9", "complete"]);
    }

    #[test]
    fn generate_with_false_condition_only_completes() {
        let log = Rc::new(RefCell::new(Vec::<String>::new()));
        generate(10, |v| *v < 5, |v| v + 1)
            .subscribe(record(&log))
            .unwrap();
        assert_eq!(*log.borrow(), vec!["complete"]);
    }

    #[test]
    fn timer_fires_once_then_completes() {
        let scheduler = TestScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        timer_on(50, Rc::new(scheduler.clone()))
            .subscribe(record(&log))
            .unwrap();

        scheduler.advance_by(Duration::from_millis(49));
        assert!(log.borrow().is_empty());
        scheduler.advance_by(Duration::from_millis(1));
        assert_eq!(*log.borrow(), vec!["0", "complete"]);
    }

    #[test]
    fn unsubscribed_timer_never_fires() {
        let scheduler = TestScheduler::new();
        let log = Rc::new(RefCell::new(Vec::<String>::new()));
        let s = timer_on(50, Rc::new(scheduler.clone()))
            .subscribe(record(&log))
            .unwrap();

        s.unsubscribe().unwrap();
        assert_eq!(scheduler.pending(), 0);
        scheduler.flush();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn throw_error_shares_the_error_instance() {
        let original = RxError::msg("nope");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let observable = throw_error::<i32>(original.clone());
        for _ in 0..2 {
            let seen = Rc::clone(&seen);
            let mut s = Subscriber::on_next(|_: i32| {});
            s.on_error(move |e| seen.borrow_mut().push(e));
            observable.subscribe(s).unwrap();
        }
        assert!(seen.borrow().iter().all(|e| e.ptr_eq(&original)));
        assert_eq!(seen.borrow().len(), 2);
    }
}
