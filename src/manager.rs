//! Audience manager façade: identity, editors, and subscription list lookup.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    api::{ApiError, SubscriptionListClient, UpdateClient},
    batch::UpdateBatch,
    config::AudienceConfig,
    consent::ConsentGate,
    core::{cache::CachedValue, collapse::overlay_subscription_lists, log::MutationLog},
    edit::{AttributeEdit, TagGroupEdit},
    editor::{AttributesEditor, SubscriptionListEditor, TagGroupsEditor},
    engine::sync::SyncEngine,
    identity::Identity,
    persist::KeyValueStore,
    runtime::{events::AudienceEvent, task::TaskScheduler},
    types::{ChannelId, Clock, DataCategory, ListId},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudienceError {
    #[error("channel not created yet")]
    ChannelNotCreated,
    #[error("failed to fetch subscription lists, status {status}")]
    FetchFailed { status: u16 },
    #[error(transparent)]
    Transport(#[from] ApiError),
}

/// External collaborators the manager is built from.
#[derive(Clone)]
pub struct AudienceDeps {
    pub store: Arc<dyn KeyValueStore>,
    pub scheduler: Arc<dyn TaskScheduler>,
    pub subscription_list_client: Arc<dyn SubscriptionListClient>,
    pub update_client: Arc<dyn UpdateClient>,
    pub consent: Arc<dyn ConsentGate>,
    pub clock: Arc<dyn Clock>,
}

pub struct AudienceManager {
    identity: Arc<Identity>,
    log: Arc<MutationLog>,
    cache: Arc<CachedValue<Vec<ListId>>>,
    consent: Arc<dyn ConsentGate>,
    list_client: Arc<dyn SubscriptionListClient>,
    engine: Arc<SyncEngine>,
    consent_enabled: Mutex<bool>,
    consent_listener: Mutex<Option<JoinHandle<()>>>,
}

impl AudienceManager {
    /// Opens the pending log, registers the update task, and starts
    /// listening for consent changes when a tokio runtime is available.
    pub fn new(deps: AudienceDeps, config: AudienceConfig) -> Arc<Self> {
        let identity = Arc::new(Identity::new());
        let log = Arc::new(MutationLog::open(deps.store, config.storage_key));
        let cache = Arc::new(CachedValue::new(deps.clock, config.max_cache_age_ms));
        let engine = Arc::new(SyncEngine::new(
            config.update_task_id,
            Arc::clone(&identity),
            Arc::clone(&deps.consent),
            Arc::clone(&log),
            Arc::clone(&cache),
            deps.update_client,
            Arc::clone(&deps.scheduler),
        ));
        deps.scheduler
            .register(engine.task_id(), engine.task_handler());

        let manager = Arc::new(Self {
            identity,
            log,
            cache,
            consent: deps.consent,
            list_client: deps.subscription_list_client,
            engine,
            consent_enabled: Mutex::new(true),
            consent_listener: Mutex::new(None),
        });

        manager.on_consent_changed();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let rx = manager.consent.subscribe();
            let listener = runtime.spawn(listen_for_consent(Arc::downgrade(&manager), rx));
            *manager.consent_listener.lock() = Some(listener);
        } else {
            debug!("no tokio runtime; consent changes must be forwarded manually");
        }
        manager
    }

    /// Current channel id, if registered.
    pub fn channel_id(&self) -> Option<ChannelId> {
        self.identity.channel_id()
    }

    /// Whether audience updates are enabled for this channel.
    pub fn is_enabled(&self) -> bool {
        self.identity.is_enabled()
    }

    /// Updates the channel id. Returns whether a sync was requested.
    pub fn set_channel_id(&self, channel_id: Option<ChannelId>) -> bool {
        self.identity.set_channel_id(channel_id) && self.engine.request_sync()
    }

    /// Updates the enabled flag. Returns whether a sync was requested.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.identity.set_enabled(enabled) && self.engine.request_sync()
    }

    /// Remote config changed; request a sync in case endpoints moved.
    pub fn on_config_updated(&self) -> bool {
        self.engine.request_sync()
    }

    /// Re-reads the consent gate.
    ///
    /// Clears the pending log once per enabled-to-disabled transition, and
    /// requests a sync when consent comes back.
    pub fn on_consent_changed(&self) {
        let enabled = self.consent.is_enabled(DataCategory::TagsAndAttributes);
        let was_enabled = std::mem::replace(&mut *self.consent_enabled.lock(), enabled);
        match (was_enabled, enabled) {
            (true, false) => {
                info!("tags and attributes disabled; clearing pending audience updates");
                self.log.clear();
            }
            (false, true) => {
                self.engine.request_sync();
            }
            _ => {}
        }
    }

    /// Editor for subscribe/unsubscribe edits.
    pub fn edit_subscription_lists(&self) -> SubscriptionListEditor {
        let committer = self.committer();
        SubscriptionListEditor::new(move |edits| {
            committer.commit(UpdateBatch::subscription_lists(edits), "subscription list")
        })
    }

    /// `allow_device_group` permits edits to the reserved device group.
    pub fn edit_tag_groups(&self, allow_device_group: bool) -> TagGroupsEditor {
        let committer = self.committer();
        TagGroupsEditor::new(allow_device_group, move |edits| {
            committer.commit(UpdateBatch::tag_groups(edits), "tag group")
        })
    }

    /// Editor for attribute set/remove edits.
    pub fn edit_attributes(&self) -> AttributesEditor {
        let committer = self.committer();
        AttributesEditor::new(move |edits| committer.commit(UpdateBatch::attributes(edits), "attribute"))
    }

    /// Subscription lists as the server will see them once pending edits land.
    ///
    /// Uses the cached snapshot while fresh, otherwise fetches one; pending
    /// subscription list edits are overlaid on the result.
    pub async fn fetch_subscription_lists(&self) -> Result<Vec<ListId>, AudienceError> {
        let channel_id = self
            .identity
            .channel_id()
            .ok_or(AudienceError::ChannelNotCreated)?;
        let lists = self.resolve_subscription_lists(&channel_id).await?;
        Ok(overlay_subscription_lists(
            lists,
            &self.log.pending_subscription_list_edits(),
        ))
    }

    /// Queued tag group edits not yet accepted by the server.
    pub fn pending_tag_group_edits(&self) -> Vec<TagGroupEdit> {
        self.log.pending_tag_group_edits()
    }

    /// Queued attribute edits not yet accepted by the server.
    pub fn pending_attribute_edits(&self) -> Vec<AttributeEdit> {
        self.log.pending_attribute_edits()
    }

    /// Stream of applied-update notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AudienceEvent> {
        self.engine.subscribe()
    }

    /// Engine driving the update task.
    pub fn sync_engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Pending update log.
    pub fn mutation_log(&self) -> &Arc<MutationLog> {
        &self.log
    }

    async fn resolve_subscription_lists(&self, channel_id: &str) -> Result<Vec<ListId>, AudienceError> {
        if let Some(cached) = self.cache.get() {
            return Ok(cached);
        }

        let response = self.list_client.get(channel_id).await.map_err(|err| {
            debug!(channel_id, error = %err, "subscription list fetch failed");
            AudienceError::from(err)
        })?;

        let status = response.status;
        let success = response.is_success();
        let list_ids = match response.list_ids {
            Some(ids) if success => ids,
            _ => return Err(AudienceError::FetchFailed { status }),
        };

        debug!(channel_id, status, lists = list_ids.len(), "fetched subscription lists");
        self.cache.set(list_ids.clone());
        Ok(list_ids)
    }

    fn committer(&self) -> Committer {
        Committer {
            log: Arc::clone(&self.log),
            consent: Arc::clone(&self.consent),
            engine: Arc::clone(&self.engine),
        }
    }
}

impl Drop for AudienceManager {
    fn drop(&mut self) {
        if let Some(listener) = self.consent_listener.lock().take() {
            listener.abort();
        }
    }
}

struct Committer {
    log: Arc<MutationLog>,
    consent: Arc<dyn ConsentGate>,
    engine: Arc<SyncEngine>,
}

impl Committer {
    fn commit(&self, batch: UpdateBatch, kind: &str) {
        if batch.is_empty() {
            return;
        }
        if !self.consent.is_enabled(DataCategory::TagsAndAttributes) {
            warn!("tags and attributes are disabled; dropping {kind} edits");
            return;
        }
        self.log.append(batch);
        self.engine.request_sync();
    }
}

async fn listen_for_consent(
    manager: Weak<AudienceManager>,
    mut rx: broadcast::Receiver<crate::consent::ConsentChange>,
) {
    loop {
        match rx.recv().await {
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
        let Some(manager) = manager.upgrade() else {
            break;
        };
        manager.on_consent_changed();
    }
}
