//! `BehaviorSubject` example
//!
//! A `BehaviorSubject` always holds a current value. New subscribers receive it
//! right away and then follow live emissions.
//!
//! To run this example, execute `cargo run --example behavior_subject`.

use rxpush::{subjects::BehaviorSubject, subscribe::Subscriber};
use rxpush::{Observer, Subscribeable};

pub fn main() {
    let (mut emitter, receiver) = BehaviorSubject::emitter_receiver(100);

    // Receives 100 immediately.
    let _ = receiver.subscribe(Subscriber::on_next(|v| println!("Subscriber #1 emitted: {}", v)));

    emitter.next(101);

    // Receives the current value 101, then 102.
    let _ = receiver.subscribe(Subscriber::on_next(|v| println!("Subscriber #2 emitted: {}", v)));
    emitter.next(102);

    println!("Current value: {}", receiver.value());
}
