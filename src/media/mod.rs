//! Background frames and audio tracks, including the `ffmpeg`/`ffprobe` shell-outs.

/// Audio track probing.
pub mod audio;
/// Background sources and the resolver that applies freeze/strict policy.
pub mod background;
