//! Validated style configuration loaded once per job.

/// Hex/array color values.
pub mod color;
/// The flat style option set.
pub mod config;
