//! Pending-update log, collapse engine, and snapshot cache.

/// Short-lived cached value with an injectable clock.
pub mod cache;
/// Net-effect reduction of queued edits.
pub mod collapse;
/// Persisted, lock-guarded queue of pending update batches.
pub mod log;
