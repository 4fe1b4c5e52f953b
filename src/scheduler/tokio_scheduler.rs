use std::time::Duration;

use tokio::time::Instant;

use super::Scheduler;
use crate::subscribe::Subscription;

/// Scheduler backed by the tokio runtime.
///
/// Each scheduled closure runs in its own `spawn_local` task after a
/// `tokio::time::sleep`, so the scheduler must be used inside a `LocalSet`.
/// Releasing the returned subscription aborts the task.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    epoch: Instant,
}

impl TokioScheduler {
    #[must_use]
    pub fn new() -> Self {
        TokioScheduler {
            epoch: Instant::now(),
        }
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Subscription {
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        Subscription::new(move || handle.abort())
    }
}
