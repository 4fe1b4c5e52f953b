//! `Subject` example
//!
//! A `Subject` multicasts every value to the subscribers registered at the time
//! of emission. Late subscribers only see what comes after they subscribed.
//!
//! To run this example, execute `cargo run --example subject`.

use std::fmt::Display;

use rxpush::{subjects::Subject, subscribe::Subscriber};
use rxpush::{ObservableExt, Observer, Subscribeable, Unsubscribeable};

pub fn create_subscriber<T: Display + 'static>(subscriber_id: i32) -> Subscriber<T> {
    Subscriber::new(
        move |v| println!("Subscriber #{} emitted: {}", subscriber_id, v),
        |e| eprintln!("Error {}", e),
        move || println!("Completed {}", subscriber_id),
    )
}

pub fn main() {
    let (mut emitter, receiver) = Subject::emitter_receiver();

    let _ = receiver.subscribe(create_subscriber(1));

    emitter.next(101); // Emits 101 to `Subscriber` 1.
    emitter.next(102); // Emits 102 to `Subscriber` 1.

    // Operators work on the receiver as on any observable.
    let _ = receiver
        .clone()
        .map(|v| format!("mapped {}", v))
        .subscribe(create_subscriber(2));

    emitter.next(103); // Emits 103 to `Subscriber`'s 1 and 2.
    emitter.complete(); // Completes `Subscriber`'s 1 and 2.

    // Subscribing after completion only delivers the completion.
    let _ = receiver.subscribe(create_subscriber(3));

    // Closing the receiver makes every later subscribe fail.
    let _ = receiver.unsubscribe();
    if let Err(e) = receiver.subscribe(create_subscriber::<i32>(4)) {
        eprintln!("Subscriber #4 rejected: {}", e);
    }
}
