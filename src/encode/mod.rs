//! Frame sinks: the hand-off from rendered frames to the encoder/muxer.

/// `ffmpeg`-backed MP4 sink.
pub mod ffmpeg;
/// Sink trait and in-memory sink.
pub mod sink;
