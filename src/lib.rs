//! Lyricframe renders word-timed lyric videos.
//!
//! A job flows through explicit stages, each producing an immutable artifact:
//!
//! - [`normalize_words`] cleans a transcript into a validated word stream
//! - [`segment_words`] groups words into display lines
//! - [`schedule_lines`] assigns display windows and per-word reveal times
//! - [`FrameCompositor`] draws highlighted text over a background frame
//! - [`RenderJob`] renders every frame in parallel and streams them, in order, into a
//!   [`FrameSink`]
#![forbid(unsafe_code)]

mod foundation;

/// Content-addressed frame cache and stable fingerprints.
pub mod cache;
/// Frame sinks.
pub mod encode;
/// Subtitle and schedule exports.
pub mod export;
/// Line segmentation.
pub mod lines;
/// Background frames and audio.
pub mod media;
/// Text rendering and compositing.
pub mod render;
/// Render job coordination.
pub mod session;
/// Style configuration.
pub mod style;
/// Display scheduling and timeline queries.
pub mod timing;
/// Words and transcripts.
pub mod transcript;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange, Rgba8Premul};
pub use crate::foundation::error::{JobLocation, LyricError, LyricResult, Stage};

pub use crate::cache::fingerprint::Fingerprint;
pub use crate::cache::store::{CacheKey, CacheStats, RenderCache, RenderCacheOpts};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::export::subtitles::{SubtitleFormat, save_subtitles, to_srt, to_vtt};
pub use crate::lines::segment::{BreakPolicy, Line, SegmentOpts, segment_words};
pub use crate::media::audio::{AudioTrack, probe_audio};
pub use crate::media::background::{
    BackgroundResolver, BackgroundSource, ImageBackground, ResolvedBackground, SolidBackground,
    VideoBackground,
};
pub use crate::render::compositor::{CompositorWorker, FrameCompositor};
pub use crate::render::frame::FrameRGBA;
pub use crate::session::budget::{WorkerBudget, WorkerPermit};
pub use crate::session::cancel::CancelToken;
pub use crate::session::render_job::{RenderEnv, RenderJob, RenderJobOpts, RenderStats};
pub use crate::session::retry::RetryPolicy;
pub use crate::style::color::Color;
pub use crate::style::config::{StyleConfig, TextAnchor};
pub use crate::timing::schedule::{Reveal, ScheduleOpts, ScheduledLine, schedule_lines};
pub use crate::timing::timeline::{ActiveLine, WordState, active_lines, word_state};
pub use crate::transcript::normalize::{NormalizeOpts, normalize_words};
pub use crate::transcript::source::{Transcriber, TranscriptFile, parse_transcript_json};
pub use crate::transcript::word::Word;
