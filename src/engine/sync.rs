use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::UpdateClient,
    batch::UpdateBatch,
    consent::ConsentGate,
    core::{cache::CachedValue, log::MutationLog},
    identity::Identity,
    runtime::{
        events::AudienceEvent,
        task::{Task, TaskHandler, TaskRequestOptions, TaskScheduler},
    },
    types::{DataCategory, ListId, TaskId},
};

/// Result of one sync attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Disabled, no consent, or no channel yet.
    Skipped,
    /// The log collapsed to nothing and was cleared.
    NothingToSend,
    /// The server accepted `batch`; it was popped from the log.
    Applied {
        /// Collapsed batch that was sent.
        batch: UpdateBatch,
    },
    /// 5xx; the collapsed batch stays queued for a retry.
    ServerError {
        /// HTTP status.
        status: u16,
    },
    /// No response; the collapsed batch stays queued for a retry.
    TransportError,
    /// Any other status; left queued until the next trigger.
    Rejected {
        /// HTTP status.
        status: u16,
    },
    /// The execution budget ran out mid-request.
    Expired,
}

impl SyncOutcome {
    /// True when the scheduler should back off and retry.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::ServerError { .. } | Self::TransportError)
    }
}

/// Drains the mutation log and submits its net effect.
pub struct SyncEngine {
    task_id: TaskId,
    identity: Arc<Identity>,
    consent: Arc<dyn ConsentGate>,
    log: Arc<MutationLog>,
    cache: Arc<CachedValue<Vec<ListId>>>,
    client: Arc<dyn UpdateClient>,
    scheduler: Arc<dyn TaskScheduler>,
    events_tx: broadcast::Sender<AudienceEvent>,
}

impl SyncEngine {
    /// Engine submitting for `task_id`; nothing runs until a handler from
    /// [`SyncEngine::task_handler`] is registered.
    pub fn new(
        task_id: impl Into<TaskId>,
        identity: Arc<Identity>,
        consent: Arc<dyn ConsentGate>,
        log: Arc<MutationLog>,
        cache: Arc<CachedValue<Vec<ListId>>>,
        client: Arc<dyn UpdateClient>,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            task_id: task_id.into(),
            identity,
            consent,
            log,
            cache,
            client,
            scheduler,
            events_tx,
        }
    }

    /// Scheduler task id the engine enqueues.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Stream of applied-update events.
    pub fn subscribe(&self) -> broadcast::Receiver<AudienceEvent> {
        self.events_tx.subscribe()
    }

    /// Handler to register with the scheduler; does not keep `self` alive.
    pub fn task_handler(self: &Arc<Self>) -> Arc<dyn TaskHandler> {
        Arc::new(UpdateTask {
            engine: Arc::downgrade(self),
        })
    }

    /// Enqueues the update task when enabled with a channel id.
    ///
    /// Repeated requests fold into one pending run.
    pub fn request_sync(&self) -> bool {
        if self.identity.snapshot().sync_target().is_none() {
            return false;
        }
        self.scheduler
            .enqueue(&self.task_id, TaskRequestOptions::default());
        true
    }

    /// Runs one drain-and-submit cycle.
    ///
    /// Only the success path mutates the log after the drain. Cancelling
    /// `expiration` drops the in-flight request.
    pub async fn attempt(&self, expiration: &CancellationToken) -> SyncOutcome {
        let identity = self.identity.snapshot();
        let Some(channel_id) = identity.sync_target() else {
            debug!("audience sync skipped: disabled or no channel");
            return SyncOutcome::Skipped;
        };
        if !self.consent.is_enabled(DataCategory::TagsAndAttributes) {
            debug!("audience sync skipped: tags and attributes disabled");
            return SyncOutcome::Skipped;
        }

        let Some(batch) = self.log.drain() else {
            debug!(channel_id, "no pending audience updates");
            return SyncOutcome::NothingToSend;
        };

        debug!(channel_id, edits = batch.len(), "submitting audience update");
        let response = tokio::select! {
            biased;
            _ = expiration.cancelled() => {
                debug!(channel_id, "audience update cancelled by expiration");
                return SyncOutcome::Expired;
            }
            response = self.client.update(channel_id, &batch) => response,
        };

        match response {
            Ok(response) if response.is_success() => {
                debug!(channel_id, status = response.status, "audience update applied");
                if !self.log.pop_submitted(&batch) {
                    debug!(channel_id, "pending log changed during submission");
                }
                self.cache.invalidate();
                SyncOutcome::Applied { batch }
            }
            Ok(response) if response.is_server_error() => {
                info!(channel_id, status = response.status, "audience update failed; will retry");
                SyncOutcome::ServerError {
                    status: response.status,
                }
            }
            Ok(response) => {
                warn!(channel_id, status = response.status, "audience update rejected");
                SyncOutcome::Rejected {
                    status: response.status,
                }
            }
            Err(err) => {
                info!(channel_id, error = %err, "audience update failed; will retry");
                SyncOutcome::TransportError
            }
        }
    }

    async fn run(&self, task: Task) {
        match self.attempt(task.expiration()).await {
            SyncOutcome::Applied { batch } => {
                task.completed();
                self.request_sync();
                let _ = self.events_tx.send(AudienceEvent::Updated {
                    tag_groups: batch.tag_groups,
                    attributes: batch.attributes,
                });
            }
            outcome if outcome.should_retry() => task.failed(),
            SyncOutcome::Expired => drop(task),
            _ => task.completed(),
        }
    }
}

struct UpdateTask {
    engine: Weak<SyncEngine>,
}

#[async_trait]
impl TaskHandler for UpdateTask {
    async fn handle(&self, task: Task) {
        match self.engine.upgrade() {
            Some(engine) => engine.run(task).await,
            None => task.completed(),
        }
    }
}
