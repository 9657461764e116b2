//! Process-local [`KeyValueStore`] used when durability is not required.

use hashbrown::HashMap;
use parking_lot::Mutex;

use super::{KeyValueStore, PersistResult};

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `key` holds a value.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get_bytes(&self, key: &str) -> PersistResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_bytes(&self, key: &str, bytes: &[u8]) -> PersistResult<()> {
        self.entries.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
