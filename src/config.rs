//! Audience manager configuration.

use serde::{Deserialize, Serialize};

/// Task id used when none is configured.
pub const DEFAULT_UPDATE_TASK_ID: &str = "audience.update";
/// Store key used when none is configured.
pub const DEFAULT_STORAGE_KEY: &str = "audience.pending_updates";
/// Ten minutes.
pub const DEFAULT_MAX_CACHE_AGE_MS: u64 = 600_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudienceConfig {
    /// Scheduler task id for the update job.
    pub update_task_id: String,
    /// Store key holding the pending update log.
    pub storage_key: String,
    /// How long a fetched subscription list snapshot stays fresh.
    pub max_cache_age_ms: u64,
}

impl Default for AudienceConfig {
    fn default() -> Self {
        Self {
            update_task_id: DEFAULT_UPDATE_TASK_ID.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_cache_age_ms: DEFAULT_MAX_CACHE_AGE_MS,
        }
    }
}

impl AudienceConfig {
    /// Parses a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
