//! Task scheduling runtime and observer events.

/// Execution budget guard for time-boxed attempts.
pub mod budget;
/// Event stream types emitted by the audience manager.
pub mod events;
/// Serial task runner with retry backoff.
pub mod scheduler;
/// Task handle, handler, and scheduler traits.
pub mod task;
