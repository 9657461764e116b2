//! Update synchronization.

/// Drain, submit, and interpret one audience update attempt.
pub mod sync;
