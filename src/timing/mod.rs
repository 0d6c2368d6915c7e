//! Display windows, reveal times and timeline queries over scheduled lines.

/// Display-window and reveal scheduling.
pub mod schedule;
/// Point-in-time queries over a schedule.
pub mod timeline;
