//! Time sources and deferred execution for the time-based operators.
//!
//! A [`Scheduler`] hands out the current time and runs closures after a delay.
//! `delay`, `timer` and the time window of `ReplaySubject` go through one, as does
//! the deferred delivery of unhandled errors.
//!
//! Two implementations ship with the crate:
//!
//! - [`TokioScheduler`] runs tasks on the tokio runtime with `spawn_local`, so it
//!   must be used from inside a `tokio::task::LocalSet`.
//! - [`TestScheduler`] keeps virtual time that only moves when told to, which
//!   makes time-based behaviour testable without sleeping.
//!
//! The default scheduler is thread-local. Install one with [`set_default`]; when
//! none is installed, operators that need a scheduler create a `TokioScheduler`.

use std::{cell::RefCell, rc::Rc, time::Duration};

use crate::subscribe::Subscription;

mod test_scheduler;
mod tokio_scheduler;

pub use test_scheduler::TestScheduler;
pub use tokio_scheduler::TokioScheduler;

/// Clock plus delayed task execution.
///
/// Implementations never run a task synchronously inside `schedule`, even for a
/// zero delay.
pub trait Scheduler {
    /// Time elapsed since the scheduler's own epoch.
    fn now(&self) -> Duration;

    /// Runs `task` once `delay` has elapsed.
    ///
    /// # Returns
    ///
    /// A `Subscription` that cancels the task if it is released before the task
    /// has run. Dropping the handle does not cancel anything.
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Subscription;
}

thread_local! {
    static DEFAULT: RefCell<Option<Rc<dyn Scheduler>>> = RefCell::new(None);
}

/// Installs the default scheduler for the current thread.
pub fn set_default(scheduler: Rc<dyn Scheduler>) {
    DEFAULT.with(|d| *d.borrow_mut() = Some(scheduler));
}

/// Removes the installed default scheduler.
pub fn clear_default() {
    DEFAULT.with(|d| *d.borrow_mut() = None);
}

/// The installed default scheduler, or a new `TokioScheduler` when none is
/// installed.
pub fn default_scheduler() -> Rc<dyn Scheduler> {
    installed().unwrap_or_else(|| Rc::new(TokioScheduler::new()))
}

pub(crate) fn installed() -> Option<Rc<dyn Scheduler>> {
    DEFAULT.with(|d| d.borrow().clone())
}
