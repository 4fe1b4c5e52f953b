//! `ReplaySubject` example
//!
//! The `ReplaySubject` keeps a buffer of past emissions and hands it to every new
//! subscriber before live values. `BufSize::Bounded` limits how many values are
//! kept; `BufSize::Unbounded` keeps them all.
//!
//! To run this example, execute `cargo run --example replay_subject`.

use std::fmt::Display;

use rxpush::{
    subjects::{BufSize, ReplaySubject},
    subscribe::Subscriber,
};
use rxpush::{ObservableExt, Observer, Subscribeable};

pub fn create_subscriber<T: Display + 'static>(subscriber_id: i32) -> Subscriber<T> {
    Subscriber::new(
        move |v| println!("Subscriber #{} emitted: {}", subscriber_id, v),
        |e| eprintln!("Error {}", e),
        move || println!("Completed {}", subscriber_id),
    )
}

pub fn main() {
    let (mut emitter, receiver) = ReplaySubject::emitter_receiver(BufSize::Bounded(2));

    let _ = receiver.subscribe(create_subscriber(1));

    emitter.next(101);
    emitter.next(102);
    emitter.next(103); // 101 falls out of the buffer.

    // Replays 102 and 103.
    let _ = receiver
        .clone()
        .map(|v| format!("mapped {}", v))
        .subscribe(create_subscriber(2));

    emitter.next(104);
    emitter.complete();

    // After completion the buffer (103, 104) is replayed, then the completion.
    let _ = receiver.subscribe(create_subscriber(3));
}
