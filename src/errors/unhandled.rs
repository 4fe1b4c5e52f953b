//! Out-of-band reporting for errors nobody is listening to.
//!
//! An error ends up here when a subscriber has no error handler, when its error
//! handler itself fails, or when a teardown fails in a place where no caller can
//! receive the aggregate.
//!
//! Reports never reach the handler inside the producer that raised them. With a
//! default scheduler installed they run as a deferred task on that scheduler.
//! Otherwise they wait in a thread-local queue that is drained once the
//! outermost library call on the stack (a `subscribe`, a subject emission, a
//! scheduled task delivering to a subscriber, an `unsubscribe`) has returned.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    time::Duration,
};

use super::RxError;
use crate::scheduler;

type Handler = Rc<dyn Fn(RxError)>;

thread_local! {
    static HANDLER: RefCell<Option<Handler>> = RefCell::new(None);
    static DEPTH: Cell<usize> = Cell::new(0);
    static QUEUE: RefCell<VecDeque<RxError>> = RefCell::new(VecDeque::new());
}

/// Installs the handler invoked for unhandled errors on the current thread.
///
/// Without a handler, unhandled errors are logged with `tracing::error!`.
pub fn set_unhandled_error_handler(handler: impl Fn(RxError) + 'static) {
    HANDLER.with(|h| *h.borrow_mut() = Some(Rc::new(handler)));
}

/// Restores the default logging handler.
pub fn reset_unhandled_error_handler() {
    HANDLER.with(|h| *h.borrow_mut() = None);
}

/// Reports an error that has no in-stream destination.
///
/// The handler runs later: on the default scheduler when one is installed, or
/// after the library call currently on the stack has returned.
pub fn report_unhandled(error: RxError) {
    if let Some(scheduler) = scheduler::installed() {
        // The returned handle is dropped on purpose; dropping does not cancel.
        let _ = scheduler.schedule(Duration::ZERO, Box::new(move || dispatch(error)));
        return;
    }

    QUEUE.with(|q| q.borrow_mut().push_back(error));
    if DEPTH.with(Cell::get) == 0 {
        drain();
    }
}

/// Marks a library call in progress. Unhandled errors reported while any turn
/// is open are held back until the outermost one ends.
#[must_use]
pub(crate) struct Turn(());

impl Turn {
    pub(crate) fn enter() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Turn(())
    }
}

impl Drop for Turn {
    fn drop(&mut self) {
        let depth = DEPTH.with(|d| {
            let depth = d.get().saturating_sub(1);
            d.set(depth);
            depth
        });
        if depth == 0 && !std::thread::panicking() {
            drain();
        }
    }
}

// Keeps the depth raised while handlers run, so errors they report join the
// current drain instead of starting a nested one.
struct Draining;

impl Drop for Draining {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

fn drain() {
    DEPTH.with(|d| d.set(d.get() + 1));
    let _draining = Draining;
    loop {
        let next = QUEUE.with(|q| q.borrow_mut().pop_front());
        match next {
            Some(error) => dispatch(error),
            None => break,
        }
    }
}

fn dispatch(error: RxError) {
    let handler = HANDLER.with(|h| h.borrow().clone());
    match handler {
        Some(handler) => handler(error),
        None => tracing::error!(error = %error, "unhandled observable error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> Rc<RefCell<Vec<String>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        set_unhandled_error_handler(move |e| s.borrow_mut().push(e.to_string()));
        seen
    }

    #[test]
    fn held_until_outermost_turn_ends() {
        let seen = recording();

        {
            let _outer = Turn::enter();
            {
                let _inner = Turn::enter();
                report_unhandled(RxError::msg("first"));
            }
            assert!(seen.borrow().is_empty());
            report_unhandled(RxError::msg("second"));
            assert!(seen.borrow().is_empty());
        }

        reset_unhandled_error_handler();
        assert_eq!(*seen.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn errors_raised_by_the_handler_are_delivered_in_the_same_drain() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        set_unhandled_error_handler(move |e| {
            s.borrow_mut().push(e.to_string());
            if e.to_string() == "outer" {
                report_unhandled(RxError::msg("from handler"));
                // Still queued while this handler runs.
                assert_eq!(s.borrow().len(), 1);
            }
        });

        {
            let _turn = Turn::enter();
            report_unhandled(RxError::msg("outer"));
        }

        reset_unhandled_error_handler();
        assert_eq!(*seen.borrow(), vec!["outer", "from handler"]);
    }

    #[test]
    fn outside_any_turn_is_delivered_at_once() {
        let seen = recording();

        report_unhandled(RxError::msg("direct"));

        reset_unhandled_error_handler();
        assert_eq!(*seen.borrow(), vec!["direct"]);
    }
}
