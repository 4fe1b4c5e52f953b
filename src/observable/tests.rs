use super::*;

use std::cell::Cell;

use futures::executor::block_on;

use crate::{scheduler::TestScheduler, subjects::Subject};

type Log = Rc<RefCell<Vec<String>>>;

fn logging_subscriber<T: std::fmt::Debug + 'static>(log: &Log) -> Subscriber<T> {
    let (n, e, c) = (Rc::clone(log), Rc::clone(log), Rc::clone(log));
    Subscriber::new(
        move |v| n.borrow_mut().push(format!("{:?}", v)),
        move |err| e.borrow_mut().push(format!("error: {}", err)),
        move || c.borrow_mut().push("complete".to_string()),
    )
}

// Emits 0, 1, 2, ... for as long as the subscriber accepts values.
fn endless(emitted: Rc<Cell<u32>>) -> Observable<u32> {
    Observable::new(move |mut o: Subscriber<u32>| {
        while !o.is_stopped() {
            let i = emitted.get();
            emitted.set(i + 1);
            o.next(i);
        }
        TeardownLogic::Nil
    })
}

#[test]
fn map_and_filter_chain() {
    let log = Log::default();
    from_iter(1..=6)
        .filter(|v| v % 2 == 0)
        .map(|v| v * 10)
        .subscribe(logging_subscriber(&log))
        .unwrap();

    assert_eq!(*log.borrow(), vec!["20", "40", "60", "complete"]);
}

#[test]
fn filter_map_skips_none() {
    let log = Log::default();
    from_iter(vec!["1", "x", "3"])
        .filter_map(|s| s.parse::<i32>().ok())
        .subscribe(logging_subscriber(&log))
        .unwrap();

    assert_eq!(*log.borrow(), vec!["1", "3", "complete"]);
}

#[test]
fn take_stops_synchronous_source() {
    let emitted = Rc::new(Cell::new(0));
    let log = Log::default();

    let s = endless(Rc::clone(&emitted))
        .take(3)
        .subscribe(logging_subscriber(&log))
        .unwrap();

    assert_eq!(*log.borrow(), vec!["0", "1", "2", "complete"]);
    assert_eq!(emitted.get(), 3);
    assert!(s.is_closed());
}

#[test]
fn take_zero_never_subscribes_source() {
    let subscribed = Rc::new(Cell::new(false));
    let flag = Rc::clone(&subscribed);
    let source = Observable::new(move |_: Subscriber<i32>| {
        flag.set(true);
        TeardownLogic::Nil
    });
    let log = Log::default();

    source.take(0).subscribe(logging_subscriber(&log)).unwrap();

    assert!(!subscribed.get());
    assert_eq!(*log.borrow(), vec!["complete"]);
}

#[test]
fn setup_failure_is_returned_unchanged() {
    let failure = RxError::msg("no connection");
    let f = failure.clone();
    let source = Observable::<i32>::try_new(move |_| Err(f.clone()));
    let log = Log::default();

    let err = source
        .map(|v| v + 1)
        .filter(|_| true)
        .subscribe(logging_subscriber(&log))
        .unwrap_err();

    assert!(err.ptr_eq(&failure));
    assert!(log.borrow().is_empty());
}

#[test]
fn switch_map_mirrors_latest_inner() {
    let (mut outer_tx, outer_rx) = Subject::<i32>::emitter_receiver();
    let (mut a_tx, a_rx) = Subject::<String>::emitter_receiver();
    let (mut b_tx, b_rx) = Subject::<String>::emitter_receiver();
    let inners = vec![a_rx.clone(), b_rx.clone()];
    let log = Log::default();

    outer_rx
        .switch_map(move |i| inners[i as usize].clone().into_observable())
        .subscribe(logging_subscriber(&log))
        .unwrap();

    outer_tx.next(0);
    a_tx.next("a1".to_string());
    outer_tx.next(1);
    assert_eq!(a_rx.len(), 0);

    a_tx.next("a2".to_string());
    b_tx.next("b1".to_string());
    outer_tx.complete();
    assert_eq!(log.borrow().last().map(String::as_str), Some("\"b1\""));

    b_tx.complete();
    assert_eq!(*log.borrow(), vec!["\"a1\"", "\"b1\"", "complete"]);
}

#[test]
fn switch_map_inner_error_cancels_source() {
    let (mut outer_tx, outer_rx) = Subject::<i32>::emitter_receiver();
    let log = Log::default();

    outer_rx
        .clone()
        .switch_map(|_| throw_error::<i32>(RxError::msg("inner failed")))
        .subscribe(logging_subscriber(&log))
        .unwrap();

    outer_tx.next(1);

    assert_eq!(*log.borrow(), vec!["error: inner failed"]);
    assert!(outer_rx.is_empty());
}

#[test]
fn exhaust_map_ignores_items_while_busy() {
    let (mut outer_tx, outer_rx) = Subject::<i32>::emitter_receiver();
    let (mut inner_tx, inner_rx) = Subject::<i32>::emitter_receiver();
    let projected = Rc::new(RefCell::new(Vec::new()));
    let log = Log::default();

    let p = Rc::clone(&projected);
    outer_rx
        .exhaust_map(move |v| {
            p.borrow_mut().push(v);
            inner_rx.clone().map(move |i| i + v)
        })
        .subscribe(logging_subscriber(&log))
        .unwrap();

    outer_tx.next(100);
    outer_tx.next(200);
    inner_tx.next(1);

    assert_eq!(*projected.borrow(), vec![100]);
    assert_eq!(*log.borrow(), vec!["101"]);

    outer_tx.complete();
    inner_tx.complete();
    assert_eq!(*log.borrow(), vec!["101", "complete"]);
}

#[test]
fn exhaust_map_accepts_items_after_inner_completes() {
    let (mut outer_tx, outer_rx) = Subject::<i32>::emitter_receiver();
    let log = Log::default();

    outer_rx
        .exhaust_map(|v| of(v * 2))
        .subscribe(logging_subscriber(&log))
        .unwrap();

    outer_tx.next(1);
    outer_tx.next(2);

    assert_eq!(*log.borrow(), vec!["2", "4"]);
}

#[test]
fn catch_error_switches_to_replacement() {
    let log = Log::default();
    let seen_error = Rc::new(RefCell::new(None));

    let se = Rc::clone(&seen_error);
    from_iter(vec![1, 2])
        .merge(vec![throw_error(RxError::msg("source failed"))])
        .catch_error(move |e, _| {
            *se.borrow_mut() = Some(e.to_string());
            of(99)
        })
        .subscribe(logging_subscriber(&log))
        .unwrap();

    assert_eq!(*log.borrow(), vec!["1", "2", "99", "complete"]);
    assert_eq!(seen_error.borrow().as_deref(), Some("source failed"));
}

#[test]
fn catch_error_can_retry_source() {
    let attempts = Rc::new(Cell::new(0));
    let a = Rc::clone(&attempts);
    let flaky = Observable::new(move |mut o: Subscriber<i32>| {
        a.set(a.get() + 1);
        o.next(a.get());
        if a.get() < 3 {
            o.error(RxError::msg("flaky"));
        } else {
            o.complete();
        }
        TeardownLogic::Nil
    });
    let log = Log::default();

    flaky
        .catch_error(|_, source| source)
        .subscribe(logging_subscriber(&log))
        .unwrap();

    assert_eq!(attempts.get(), 3);
    assert_eq!(*log.borrow(), vec!["1", "2", "3", "complete"]);
}

#[test]
fn catch_error_reports_replacement_setup_failure() {
    let log = Log::default();

    throw_error::<i32>(RxError::msg("first"))
        .catch_error(|_, _| Observable::try_new(|_| Err(RxError::msg("replacement refused"))))
        .subscribe(logging_subscriber(&log))
        .unwrap();

    assert_eq!(*log.borrow(), vec!["error: replacement refused"]);
}

#[test]
fn delay_holds_values_and_completion() {
    let scheduler = TestScheduler::new();
    let (mut tx, rx) = Subject::<i32>::emitter_receiver();
    let log = Log::default();

    rx.delay_on(100, Rc::new(scheduler.clone()))
        .subscribe(logging_subscriber(&log))
        .unwrap();

    tx.next(1);
    scheduler.advance_by(Duration::from_millis(50));
    tx.next(2);
    tx.complete();

    scheduler.advance_by(Duration::from_millis(49));
    assert!(log.borrow().is_empty());

    scheduler.advance_by(Duration::from_millis(1));
    assert_eq!(*log.borrow(), vec!["1"]);

    scheduler.advance_by(Duration::from_millis(50));
    assert_eq!(*log.borrow(), vec!["1", "2", "complete"]);
}

#[test]
fn delay_unsubscribe_cancels_pending_values() {
    let scheduler = TestScheduler::new();
    let log = Log::default();

    let s = from_iter(1..=3)
        .delay_on(10, Rc::new(scheduler.clone()))
        .subscribe(logging_subscriber(&log))
        .unwrap();
    assert_eq!(scheduler.pending(), 3);

    s.unsubscribe().unwrap();
    scheduler.flush();

    assert!(log.borrow().is_empty());
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn for_each_resolves_on_completion() {
    let sum = Rc::new(Cell::new(0));
    let s = Rc::clone(&sum);

    let result = block_on(from_iter(1..=4).for_each(move |v| s.set(s.get() + v)));

    assert!(result.is_ok());
    assert_eq!(sum.get(), 10);
}

#[test]
fn for_each_resolves_with_error() {
    let failure = RxError::msg("stream failed");
    let result = block_on(throw_error::<i32>(failure.clone()).for_each(|_| {}));

    assert!(result.unwrap_err().ptr_eq(&failure));
}

#[test]
fn for_each_reports_setup_failure() {
    let source = Observable::<i32>::try_new(|_| Err(RxError::msg("refused")));
    let result = block_on(source.for_each(|_| {}));

    assert_eq!(result.unwrap_err().to_string(), "refused");
}
