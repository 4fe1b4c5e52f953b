use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::BinaryHeap,
    rc::Rc,
    time::Duration,
};

use super::Scheduler;
use crate::subscribe::Subscription;

type TaskSlot = Rc<RefCell<Option<Box<dyn FnOnce()>>>>;

struct ScheduledTask {
    due: Duration,
    seq: u64,
    task: TaskSlot,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest due time first, FIFO among equal times.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct State {
    now: Duration,
    queue: BinaryHeap<ScheduledTask>,
    next_seq: u64,
}

/// Virtual time scheduler for deterministic tests.
///
/// Time starts at zero and only moves through [`advance_by`], [`advance_to`] or
/// [`flush`]. Tasks run synchronously inside those calls, ordered by due time and
/// then by the order they were scheduled in. Clones share the same clock and
/// queue.
///
/// [`advance_by`]: TestScheduler::advance_by
/// [`advance_to`]: TestScheduler::advance_to
/// [`flush`]: TestScheduler::flush
#[derive(Clone, Default)]
pub struct TestScheduler(Rc<RefCell<State>>);

impl TestScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `delta`, running every task that falls due.
    pub fn advance_by(&self, delta: Duration) {
        let target = self.0.borrow().now + delta;
        self.advance_to(target);
    }

    /// Moves the clock to `target`, running every task due at or before it.
    ///
    /// Tasks scheduled by running tasks are picked up in the same call when they
    /// fall due before `target`. The clock never moves backwards.
    pub fn advance_to(&self, target: Duration) {
        self.run_until(Some(target));
        let mut state = self.0.borrow_mut();
        if state.now < target {
            state.now = target;
        }
    }

    /// Runs tasks until the queue is empty, moving the clock to each due time.
    pub fn flush(&self) {
        self.run_until(None);
    }

    /// Number of scheduled tasks that have neither run nor been cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.0
            .borrow()
            .queue
            .iter()
            .filter(|t| t.task.borrow().is_some())
            .count()
    }

    fn run_until(&self, limit: Option<Duration>) {
        loop {
            let next = {
                let mut state = self.0.borrow_mut();
                let due = match state.queue.peek() {
                    Some(task) if limit.map_or(true, |limit| task.due <= limit) => task.due,
                    _ => break,
                };
                if state.now < due {
                    state.now = due;
                }
                state.queue.pop()
            };

            let task = next.and_then(|scheduled| scheduled.task.borrow_mut().take());
            if let Some(task) = task {
                task();
            }
        }
    }
}

impl Scheduler for TestScheduler {
    fn now(&self) -> Duration {
        self.0.borrow().now
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Subscription {
        let slot: TaskSlot = Rc::new(RefCell::new(Some(task)));
        let seq = {
            let mut state = self.0.borrow_mut();
            let seq = state.next_seq;
            state.next_seq += 1;
            let due = state.now + delay;
            state.queue.push(ScheduledTask {
                due,
                seq,
                task: Rc::clone(&slot),
            });
            seq
        };
        let state = Rc::downgrade(&self.0);
        Subscription::new(move || {
            let cancelled = slot.borrow_mut().take();
            if cancelled.is_none() {
                return;
            }
            drop(cancelled);
            // An emptied slot is skipped when popped, so the entry only has to
            // leave the queue when the state is free to borrow.
            if let Some(state) = state.upgrade() {
                if let Ok(mut state) = state.try_borrow_mut() {
                    state.queue.retain(|t| t.seq != seq);
                }
            }
        })
    }
}
