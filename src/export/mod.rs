//! Sidecar exports of a schedule.

/// SRT, WebVTT and JSON writers.
pub mod subtitles;
