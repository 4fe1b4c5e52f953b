//! A synchronous `Observable` that emits values from 1 to 10 and completes.
//!
//! The producer checks `is_stopped` between emissions, so operators like `take`
//! can end it early. The returned teardown runs once the subscription is
//! released, either by `take` or by the completion itself.
//!
//! To run this example, execute `cargo run --example basic_observable`.

use rxpush::subscribe::{Subscriber, TeardownLogic};
use rxpush::{Observable, ObservableExt, Observer, Subscribeable};

fn main() {
    let emit_10_observable = Observable::new(|mut subscriber: Subscriber<i32>| {
        for i in 1..=10 {
            if subscriber.is_stopped() {
                break;
            }
            subscriber.next(i);
        }
        subscriber.complete();

        TeardownLogic::logic(|| println!("Released"))
    });

    let mut observer = Subscriber::on_next(|v| println!("Emitted {}", v));
    observer.on_complete(|| println!("Completed"));

    // Observables are cold; nothing is emitted until this call.
    let _ = emit_10_observable.subscribe(observer);

    // Each subscription runs its own producer.
    let _ = emit_10_observable
        .filter(|v| v % 3 == 0)
        .map(|v| format!("third {}", v))
        .take(2)
        .subscribe(Subscriber::on_next(|v| println!("{}", v)));

    println!("Custom Observable finished emitting");
}
