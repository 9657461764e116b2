//! SQLite-backed key-value blob store.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};

use crate::types::{Clock, SystemClock};

use super::{KeyValueStore, PersistResult};

/// SQLite implementation of [`crate::persist::KeyValueStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates a SQLite-backed store at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> PersistResult<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Returns true when no keys are stored.
    pub fn is_empty(&self) -> PersistResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl KeyValueStore for SqliteStore {
    fn get_bytes(&self, key: &str) -> PersistResult<Option<Vec<u8>>> {
        let value = self
            .conn
            .lock()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_bytes(&self, key: &str, bytes: &[u8]) -> PersistResult<()> {
        let updated_ms = SystemClock.now_ms();
        self.conn.lock().execute(
            "INSERT INTO kv(key, updated_ms, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET updated_ms = excluded.updated_ms, value = excluded.value",
            params![key, updated_ms as i64, bytes],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistResult<()> {
        self.conn
            .lock()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}
