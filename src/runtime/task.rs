//! Scheduler-facing task interfaces.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::types::TaskId;

/// Options attached to an enqueue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequestOptions {
    /// Hold the request until the network is reachable.
    pub requires_network: bool,
    /// Fold into an already pending request for the same task instead of
    /// replacing it (and resetting its backoff).
    pub dedupe: bool,
}

impl Default for TaskRequestOptions {
    fn default() -> Self {
        Self {
            requires_network: true,
            dedupe: true,
        }
    }
}

/// How a task attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The handler finished; nothing to retry.
    Completed,
    /// The handler asks for a retry with backoff.
    Failed,
    /// The handle was dropped without a report, e.g. after expiration.
    Released,
}

/// Handle for one attempt of a scheduled task.
///
/// The outcome is reported exactly once: [`Task::completed`] and
/// [`Task::failed`] consume the handle, and dropping it unreported sends
/// [`TaskOutcome::Released`].
#[derive(Debug)]
pub struct Task {
    task_id: TaskId,
    attempt: u32,
    expiration: CancellationToken,
    reporter: Option<oneshot::Sender<TaskOutcome>>,
}

impl Task {
    /// Creates a handle and the receiver its outcome is reported to.
    pub fn new(
        task_id: impl Into<TaskId>,
        attempt: u32,
        expiration: CancellationToken,
    ) -> (Self, oneshot::Receiver<TaskOutcome>) {
        let (tx, rx) = oneshot::channel();
        let task = Self {
            task_id: task_id.into(),
            attempt,
            expiration,
            reporter: Some(tx),
        };
        (task, rx)
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Zero for the first attempt, incremented by each retry.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Cancelled when the attempt's execution budget runs out.
    pub fn expiration(&self) -> &CancellationToken {
        &self.expiration
    }

    /// Reports success; no retry.
    pub fn completed(mut self) {
        self.report(TaskOutcome::Completed);
    }

    /// Reports failure; the scheduler retries with backoff.
    pub fn failed(mut self) {
        self.report(TaskOutcome::Failed);
    }

    fn report(&mut self, outcome: TaskOutcome) {
        if let Some(tx) = self.reporter.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.report(TaskOutcome::Released);
    }
}

/// Work invoked by a scheduler for a registered task id.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Runs one attempt and reports its outcome through `task`.
    async fn handle(&self, task: Task);
}

/// Background job scheduler.
pub trait TaskScheduler: Send + Sync + 'static {
    /// Registers `handler` for `task_id`, replacing any previous handler.
    fn register(&self, task_id: &str, handler: Arc<dyn TaskHandler>);
    /// Requests that `task_id` run soon.
    fn enqueue(&self, task_id: &str, options: TaskRequestOptions);
}
