use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::types::TaskId;

use super::{
    budget::BudgetGuard,
    task::{Task, TaskHandler, TaskOutcome, TaskRequestOptions, TaskScheduler},
};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler channel closed")]
    ChannelClosed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Delay before the first retry of a failed attempt.
    pub initial_backoff_ms: u64,
    /// Upper bound for the doubling retry delay.
    pub max_backoff_ms: u64,
    /// Time each attempt may run before its expiration token fires.
    pub execution_budget_ms: u64,
    /// Initial network reachability.
    pub network_available: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 30_000,
            max_backoff_ms: 120_000,
            execution_budget_ms: 30_000,
            network_available: true,
        }
    }
}

impl SchedulerConfig {
    /// Retry delay after `failures` consecutive failed attempts.
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let shift = (failures - 1).min(32);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Counters describing scheduler activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub released: u64,
    pub budgets_released: u64,
    pub pending: usize,
}

/// Cloneable handle to a running scheduler; implements [`TaskScheduler`].
#[derive(Clone)]
pub struct SchedulerHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

enum Command {
    Register {
        task_id: TaskId,
        handler: Arc<dyn TaskHandler>,
    },
    Enqueue {
        task_id: TaskId,
        options: TaskRequestOptions,
    },
    SetNetworkAvailable(bool),
    Stats {
        resp: oneshot::Sender<SchedulerStats>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct Finished {
    task_id: TaskId,
    attempt: u32,
    options: TaskRequestOptions,
    outcome: TaskOutcome,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    options: TaskRequestOptions,
    failures: u32,
    not_before: Instant,
}

struct SchedulerLoop {
    config: SchedulerConfig,
    handlers: HashMap<TaskId, Arc<dyn TaskHandler>>,
    pending: HashMap<TaskId, Pending>,
    running: Option<CancellationToken>,
    network_available: bool,
    stats: SchedulerStats,
    budgets_released: Arc<AtomicU64>,
    done_tx: mpsc::UnboundedSender<Finished>,
}

/// Spawns a serial task runner: at most one attempt runs at a time.
///
/// Must be called within a tokio runtime.
pub fn spawn_scheduler(config: SchedulerConfig) -> SchedulerHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Finished>();

    let mut state = SchedulerLoop {
        network_available: config.network_available,
        config,
        handlers: HashMap::new(),
        pending: HashMap::new(),
        running: None,
        stats: SchedulerStats::default(),
        budgets_released: Arc::new(AtomicU64::new(0)),
        done_tx,
    };

    tokio::spawn(async move {
        loop {
            if state.running.is_none() {
                state.launch_next_ready();
            }
            let deadline = state.next_deadline();

            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if state.handle_command(cmd) {
                        break;
                    }
                }
                Some(done) = done_rx.recv() => {
                    state.handle_finished(done);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {}
            }
        }

        if let Some(token) = state.running.take() {
            token.cancel();
        }
    });

    SchedulerHandle { cmd_tx }
}

impl SchedulerHandle {
    /// Updates network reachability; held network tasks start once it is up.
    pub fn set_network_available(&self, available: bool) {
        let _ = self.cmd_tx.send(Command::SetNetworkAvailable(available));
    }

    pub async fn stats(&self) -> Result<SchedulerStats, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Stats { resp: tx })
            .map_err(|_| SchedulerError::ChannelClosed)?;
        rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }

    /// Stops the runner and expires any in-flight attempt.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .map_err(|_| SchedulerError::ChannelClosed)?;
        rx.await.map_err(|_| SchedulerError::ChannelClosed)
    }
}

impl TaskScheduler for SchedulerHandle {
    fn register(&self, task_id: &str, handler: Arc<dyn TaskHandler>) {
        let _ = self.cmd_tx.send(Command::Register {
            task_id: task_id.to_string(),
            handler,
        });
    }

    fn enqueue(&self, task_id: &str, options: TaskRequestOptions) {
        let _ = self.cmd_tx.send(Command::Enqueue {
            task_id: task_id.to_string(),
            options,
        });
    }
}

impl SchedulerLoop {
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Register { task_id, handler } => {
                debug!(task = %task_id, "registered task handler");
                self.handlers.insert(task_id, handler);
            }
            Command::Enqueue { task_id, options } => {
                let now = Instant::now();
                match self.pending.get_mut(&task_id) {
                    Some(_) if options.dedupe => {}
                    Some(existing) => {
                        existing.options = options;
                        existing.failures = 0;
                        existing.not_before = now;
                    }
                    None => {
                        self.pending.insert(
                            task_id,
                            Pending {
                                options,
                                failures: 0,
                                not_before: now,
                            },
                        );
                    }
                }
            }
            Command::SetNetworkAvailable(available) => {
                self.network_available = available;
            }
            Command::Stats { resp } => {
                let mut stats = self.stats.clone();
                stats.budgets_released = self.budgets_released.load(Ordering::Acquire);
                stats.pending = self.pending.len();
                let _ = resp.send(stats);
            }
            Command::Shutdown { resp } => {
                let _ = resp.send(());
                return true;
            }
        }
        false
    }

    fn handle_finished(&mut self, done: Finished) {
        self.running = None;
        match done.outcome {
            TaskOutcome::Completed => {
                self.stats.completed += 1;
                debug!(task = %done.task_id, attempt = done.attempt, "task completed");
            }
            TaskOutcome::Failed | TaskOutcome::Released => {
                if done.outcome == TaskOutcome::Failed {
                    self.stats.failed += 1;
                } else {
                    self.stats.released += 1;
                }
                let failures = done.attempt.saturating_add(1);
                let delay = self.config.backoff(failures);
                debug!(
                    task = %done.task_id,
                    outcome = ?done.outcome,
                    ?delay,
                    "task will retry"
                );
                self.pending.insert(
                    done.task_id,
                    Pending {
                        options: done.options,
                        failures,
                        not_before: Instant::now() + delay,
                    },
                );
            }
        }
    }

    fn is_runnable(&self, pending: &Pending) -> bool {
        self.network_available || !pending.options.requires_network
    }

    fn next_deadline(&self) -> Option<Instant> {
        if self.running.is_some() {
            return None;
        }
        self.pending
            .values()
            .filter(|p| self.is_runnable(p))
            .map(|p| p.not_before)
            .min()
    }

    fn launch_next_ready(&mut self) {
        let now = Instant::now();
        let next = self
            .pending
            .iter()
            .filter(|(_, p)| p.not_before <= now && self.is_runnable(p))
            .min_by_key(|(_, p)| p.not_before)
            .map(|(id, _)| id.clone());

        let Some(task_id) = next else {
            return;
        };
        let Some(pending) = self.pending.remove(&task_id) else {
            return;
        };
        let Some(handler) = self.handlers.get(&task_id).cloned() else {
            warn!(task = %task_id, "dropping request for unregistered task");
            return;
        };

        let token = CancellationToken::new();
        let attempt = pending.failures;
        let options = pending.options;
        let (task, outcome_rx) = Task::new(task_id.clone(), attempt, token.clone());

        let budgets_released = Arc::clone(&self.budgets_released);
        let guard = BudgetGuard::begin(
            task_id.clone(),
            Duration::from_millis(self.config.execution_budget_ms),
            token.clone(),
            move || {
                budgets_released.fetch_add(1, Ordering::AcqRel);
            },
        );

        self.running = Some(token);
        self.stats.started += 1;
        debug!(task = %task_id, attempt, "starting task");

        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let run = tokio::spawn(async move { handler.handle(task).await });
            let outcome = match run.await {
                Ok(()) => outcome_rx.await.unwrap_or(TaskOutcome::Released),
                Err(err) => {
                    warn!(task = %task_id, attempt, error = %err, "task handler panicked");
                    TaskOutcome::Failed
                }
            };
            guard.release();
            let _ = done_tx.send(Finished {
                task_id,
                attempt,
                options,
                outcome,
            });
        });
    }
}
