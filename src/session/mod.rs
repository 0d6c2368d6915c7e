//! Render job coordination: planning, parallel frame rendering and in-order hand-off.

/// Shared worker permits across concurrent jobs.
pub mod budget;
/// Cooperative cancellation.
pub mod cancel;
/// The render job itself.
pub mod render_job;
/// Bounded retry with jittered exponential backoff.
pub mod retry;
