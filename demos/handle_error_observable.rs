//! Recovering from errors with `catch_error`.
//!
//! The selector receives the error and the failed source. Returning the source
//! retries it; here the first failure is retried once and the second one is
//! replaced with a fallback value.
//!
//! To run this example, execute `cargo run --example handle_error_observable`.

use std::{cell::Cell, rc::Rc};

use rxpush::subscribe::{Subscriber, TeardownLogic};
use rxpush::{of, Observable, ObservableExt, Observer, RxError, Subscribeable};

fn main() {
    let attempts = Rc::new(Cell::new(0));

    let a = Rc::clone(&attempts);
    let flaky = Observable::new(move |mut o: Subscriber<i32>| {
        a.set(a.get() + 1);
        o.next(1);
        o.error(RxError::msg(format!("attempt {} failed", a.get())));
        TeardownLogic::Nil
    });

    let observer = Subscriber::new(
        |v| println!("Emitted {}", v),
        |e| eprintln!("Error {}", e),
        || println!("Completed"),
    );

    let retried = Rc::new(Cell::new(false));
    let _ = flaky
        .catch_error(move |e, source| {
            println!("Caught: {}", e);
            if retried.replace(true) {
                of(-1)
            } else {
                source
            }
        })
        .subscribe(observer);

    println!("Source subscribed {} times", attempts.get());
}
