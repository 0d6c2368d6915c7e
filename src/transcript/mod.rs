//! Timestamped words and the transcription boundary.
//!
//! Raw words come from a [`Transcriber`](source::Transcriber) and are cleaned by
//! [`normalize_words`](normalize::normalize_words) before anything else looks at them.

/// Word stream normalization.
pub mod normalize;
/// Transcription collaborator and file-backed transcripts.
pub mod source;
/// The timestamped word type.
pub mod word;
