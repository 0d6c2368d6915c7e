//! Content-addressed frame cache.

/// Stable xxh3 fingerprints of job inputs.
pub mod fingerprint;
/// In-memory and on-disk frame store.
pub mod store;
