//! Consent gate interface and an in-process privacy manager.

use hashbrown::HashSet;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::DataCategory;

/// Notification that the set of enabled categories changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsentChange;

/// Decides whether a data-collection category is currently permitted.
pub trait ConsentGate: Send + Sync + 'static {
    /// True when `category` may be collected.
    fn is_enabled(&self, category: DataCategory) -> bool;
    /// Stream of change notifications.
    fn subscribe(&self) -> broadcast::Receiver<ConsentChange>;
}

/// [`ConsentGate`] holding the enabled categories in memory.
pub struct PrivacyManager {
    enabled: Mutex<HashSet<DataCategory>>,
    changes: broadcast::Sender<ConsentChange>,
}

impl PrivacyManager {
    /// Creates a manager with `enabled` categories turned on.
    pub fn new(enabled: impl IntoIterator<Item = DataCategory>) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            enabled: Mutex::new(enabled.into_iter().collect()),
            changes,
        }
    }

    /// Creates a manager with every category turned on.
    pub fn all_enabled() -> Self {
        Self::new([
            DataCategory::TagsAndAttributes,
            DataCategory::Analytics,
            DataCategory::Push,
            DataCategory::Location,
        ])
    }

    /// Turns `category` on.
    pub fn enable(&self, category: DataCategory) {
        let changed = self.enabled.lock().insert(category);
        self.notify(changed);
    }

    /// Turns `category` off.
    pub fn disable(&self, category: DataCategory) {
        let changed = self.enabled.lock().remove(&category);
        self.notify(changed);
    }

    /// Replaces the enabled set.
    pub fn set_enabled(&self, categories: impl IntoIterator<Item = DataCategory>) {
        let next: HashSet<DataCategory> = categories.into_iter().collect();
        let changed = {
            let mut enabled = self.enabled.lock();
            let changed = *enabled != next;
            *enabled = next;
            changed
        };
        self.notify(changed);
    }

    fn notify(&self, changed: bool) {
        if changed {
            debug!("privacy settings changed");
            let _ = self.changes.send(ConsentChange);
        }
    }
}

impl ConsentGate for PrivacyManager {
    fn is_enabled(&self, category: DataCategory) -> bool {
        self.enabled.lock().contains(&category)
    }

    fn subscribe(&self) -> broadcast::Receiver<ConsentChange> {
        self.changes.subscribe()
    }
}
