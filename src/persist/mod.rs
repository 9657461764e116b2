pub mod memory;
pub mod sqlite;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported log format version {0}")]
    UnsupportedFormat(u16),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Durable key-value store for small blobs.
pub trait KeyValueStore: Send + Sync {
    fn get_bytes(&self, key: &str) -> PersistResult<Option<Vec<u8>>>;
    fn set_bytes(&self, key: &str, bytes: &[u8]) -> PersistResult<()>;
    fn remove(&self, key: &str) -> PersistResult<()>;
}
