//! Time-based operators on the tokio runtime.
//!
//! `TokioScheduler` spawns its tasks with `spawn_local`, so everything runs inside
//! a `LocalSet`. `switch_map` drops a pending inner timer as soon as a new value
//! arrives, and `for_each` resolves when the stream completes.
//!
//! To run this example, execute `cargo run --example async_observable_tokio`.

use std::rc::Rc;

use rxpush::{from_iter, scheduler::TokioScheduler, timer_on, ObservableExt};
use tokio::task::LocalSet;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    LocalSet::new()
        .run_until(async {
            let scheduler = Rc::new(TokioScheduler::new());
            let inner_scheduler = Rc::clone(&scheduler);

            // All four values arrive together after 50ms. Each one starts an 80ms
            // timer that the next value cancels, so only 4 is emitted.
            let result = from_iter(1..=4)
                .delay_on(50, scheduler)
                .switch_map(move |v| {
                    timer_on(80, inner_scheduler.clone()).map(move |_| v)
                })
                .for_each(|v| println!("Emitted {}", v))
                .await;

            match result {
                Ok(()) => println!("Completed"),
                Err(e) => eprintln!("Error {}", e),
            }
        })
        .await;
}
