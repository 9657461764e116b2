use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    batch::{LOG_FORMAT_VERSION, LogEnvelope, UpdateBatch},
    edit::{AttributeEdit, SubscriptionListEdit, TagGroupEdit},
    persist::{KeyValueStore, PersistError, PersistResult},
};

use super::collapse;

/// Ordered queue of pending [`UpdateBatch`]es persisted under one store key.
///
/// Every operation runs under a single mutex, including the write to the
/// backing store, so concurrent read-modify-write cycles never interleave.
/// The in-memory copy is authoritative for the process lifetime; store
/// failures are logged and otherwise tolerated.
pub struct MutationLog {
    store: Arc<dyn KeyValueStore>,
    key: String,
    batches: Mutex<Vec<UpdateBatch>>,
}

impl MutationLog {
    /// Opens the log stored under `key`, starting empty if nothing decodes.
    pub fn open(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let batches = match load_batches(store.as_ref(), &key) {
            Ok(batches) => batches,
            Err(err) => {
                warn!(%key, error = %err, "discarding unreadable pending audience updates");
                Vec::new()
            }
        };
        debug!(%key, batches = batches.len(), "opened audience mutation log");

        Self {
            store,
            key,
            batches: Mutex::new(batches),
        }
    }

    /// Appends `batch` to the tail. Empty batches are ignored.
    pub fn append(&self, batch: UpdateBatch) {
        if batch.is_empty() {
            return;
        }
        let mut batches = self.batches.lock();
        batches.push(batch);
        self.persist(&batches);
    }

    /// Snapshot of every queued batch, oldest first.
    pub fn read_all(&self) -> Vec<UpdateBatch> {
        self.batches.lock().clone()
    }

    /// Number of queued batches.
    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }

    /// Overwrites the whole log.
    pub fn replace(&self, replacement: Vec<UpdateBatch>) {
        let mut batches = self.batches.lock();
        *batches = replacement;
        self.persist(&batches);
    }

    /// Removes and returns the head batch.
    pub fn pop_first(&self) -> Option<UpdateBatch> {
        let mut batches = self.batches.lock();
        if batches.is_empty() {
            return None;
        }
        let head = batches.remove(0);
        self.persist(&batches);
        Some(head)
    }

    /// Removes the head batch only if it is still `submitted`.
    ///
    /// The log may have been cleared and refilled while a submission was in
    /// flight; in that case the new head was never sent and must stay.
    pub fn pop_submitted(&self, submitted: &UpdateBatch) -> bool {
        let mut batches = self.batches.lock();
        if batches.first() != Some(submitted) {
            return false;
        }
        batches.remove(0);
        self.persist(&batches);
        true
    }

    /// Empties the log and removes its key from the store.
    pub fn clear(&self) {
        let mut batches = self.batches.lock();
        batches.clear();
        if let Err(err) = self.store.remove(&self.key) {
            warn!(key = %self.key, error = %err, "failed to remove pending audience updates");
        }
    }

    /// Collapses the whole log into at most one batch, in one critical section.
    ///
    /// Stores `[collapsed]` and returns it, or clears the log and returns
    /// `None` when the edits cancel out. Appends racing with a drain land
    /// either before the read or after the replace.
    pub fn drain(&self) -> Option<UpdateBatch> {
        let mut batches = self.batches.lock();
        match collapse::collapse(&batches) {
            Some(collapsed) => {
                *batches = vec![collapsed.clone()];
                self.persist(&batches);
                Some(collapsed)
            }
            None => {
                batches.clear();
                self.persist(&batches);
                None
            }
        }
    }

    /// Every queued tag group edit, uncollapsed and in order.
    pub fn pending_tag_group_edits(&self) -> Vec<TagGroupEdit> {
        self.batches
            .lock()
            .iter()
            .flat_map(|b| b.tag_groups.iter().cloned())
            .collect()
    }

    /// Every queued attribute edit, uncollapsed and in order.
    pub fn pending_attribute_edits(&self) -> Vec<AttributeEdit> {
        self.batches
            .lock()
            .iter()
            .flat_map(|b| b.attributes.iter().cloned())
            .collect()
    }

    /// Net subscription list edits still waiting to be sent.
    pub fn pending_subscription_list_edits(&self) -> Vec<SubscriptionListEdit> {
        let batches = self.batches.lock();
        collapse::collapse(&batches)
            .map(|b| b.subscription_lists)
            .unwrap_or_default()
    }

    // Caller holds the batches lock.
    fn persist(&self, batches: &[UpdateBatch]) {
        if let Err(err) = store_batches(self.store.as_ref(), &self.key, batches) {
            warn!(
                key = %self.key,
                batches = batches.len(),
                error = %err,
                "failed to persist pending audience updates"
            );
        }
    }
}

fn store_batches(store: &dyn KeyValueStore, key: &str, batches: &[UpdateBatch]) -> PersistResult<()> {
    let payload = serde_json::to_vec(&LogEnvelope::new(batches.to_vec()))?;
    store.set_bytes(key, &payload)
}

fn load_batches(store: &dyn KeyValueStore, key: &str) -> PersistResult<Vec<UpdateBatch>> {
    let Some(payload) = store.get_bytes(key)? else {
        return Ok(Vec::new());
    };

    if let Ok(envelope) = serde_json::from_slice::<LogEnvelope>(&payload) {
        if envelope.format_version != LOG_FORMAT_VERSION {
            return Err(PersistError::UnsupportedFormat(envelope.format_version));
        }
        return Ok(envelope.batches);
    }

    // Older payloads stored the bare batch list.
    Ok(serde_json::from_slice::<Vec<UpdateBatch>>(&payload)?)
}
