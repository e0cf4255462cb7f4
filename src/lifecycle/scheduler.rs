//! Delayed and periodic tasks.

use std::future::Future;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::lifecycle::TaskRunner;

/// Handle to a scheduled task.
#[derive(Debug)]
pub struct Timeout {
    handle: AbortHandle,
}

impl Timeout {
    /// Stop the task. A run already in progress is dropped at its next await.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Runs work later or repeatedly on the task runner.
#[derive(Debug, Clone)]
pub struct Scheduler {
    runner: TaskRunner,
}

impl Scheduler {
    pub fn new(runner: TaskRunner) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Run `task` once after `delay`.
    pub fn schedule<F>(&self, name: &'static str, delay: Duration, task: F) -> Timeout
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.runner.spawn(name, async move {
            time::sleep(delay).await;
            task.await;
        });
        Timeout { handle }
    }

    /// Run `task` every `period`, first after one period. Runs never overlap.
    pub fn schedule_periodic<F, Fut>(&self, name: &'static str, period: Duration, mut task: F) -> Timeout
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = self.runner.spawn(name, async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                task().await;
            }
        });
        Timeout { handle }
    }
}
