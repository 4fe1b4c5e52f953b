//! `rxpush` is a single-threaded, push-based implementation of reactive streams.
//!
//! An [`Observable`] is a lazy producer: nothing happens until it is subscribed
//! with a [`Subscriber`](subscribe::Subscriber), and every subscription runs its
//! own producer. Values are pushed through `next`, and a stream ends with at most
//! one `error` or `complete`. Subscribing returns a
//! [`Subscription`](subscribe::Subscription) which releases everything the
//! producer set up.
//!
//! [`subjects`] are multicast: one producer side, many subscribers. Operators on
//! [`ObservableExt`] compose streams, and the time-based ones (`delay`, `timer`,
//! the `ReplaySubject` window) run on a [`scheduler::Scheduler`]. Observables can
//! also be consumed by pulling values one at a time through [`PullIter`], or
//! driven to completion with [`Observable::for_each`].
//!
//! Everything here is `Rc` based and `!Send`. Asynchronous work is scheduled on a
//! tokio `LocalSet` or, in tests, on a virtual-time
//! [`TestScheduler`](scheduler::TestScheduler).
//!
//! Errors that reach a subscriber without an error handler, and errors raised
//! while tearing down, are delivered to the handler installed with
//! [`set_unhandled_error_handler`]. The default handler logs them through
//! `tracing`.
//!
//! # Examples
//!
//!```no_run
//! use rxpush::{subscribe::Subscriber, ObservableExt, Subscribeable};
//!
//! let _ = rxpush::from_iter(1..=10)
//!     .filter(|v| v % 2 == 0)
//!     .map(|v| v * 10)
//!     .take(3)
//!     .subscribe(Subscriber::new(
//!         |v| println!("Emitted {}", v),
//!         |e| eprintln!("Error {}", e),
//!         || println!("Completed"),
//!     ));
//!```

mod errors;
pub mod observable;
pub mod observer;
pub mod scheduler;
pub mod subjects;
pub mod subscription;

pub use errors::*;
pub use observable::*;
pub use observer::Observer;
pub use subjects::Subject;
pub use subscription::subscribe;
pub use subscription::subscribe::{Subscribeable, Unsubscribeable};
