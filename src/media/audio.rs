use crate::foundation::error::{LyricError, LyricResult};
use std::path::{Path, PathBuf};

/// The original audio file muxed under the video.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl AudioTrack {
    pub fn new(path: impl Into<PathBuf>, duration_secs: f64) -> LyricResult<Self> {
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(LyricError::validation(
                "audio duration must be finite and >= 0",
            ));
        }
        Ok(Self {
            path: path.into(),
            duration_secs,
        })
    }
}

/// Probe an audio (or audio-bearing video) file's duration through `ffprobe`.
pub fn probe_audio(path: &Path) -> LyricResult<AudioTrack> {
    let duration = probe_duration_secs(path)?;
    AudioTrack::new(path, duration)
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    format: ProbeFormat,
}

/// Container duration in seconds as reported by `ffprobe -show_format`.
pub(crate) fn probe_duration_secs(path: &Path) -> LyricResult<f64> {
    let out = std::process::Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .map_err(|e| LyricError::transient(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(LyricError::validation(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_probe_duration(&out.stdout)
}

pub(crate) fn parse_probe_duration(json: &[u8]) -> LyricResult<f64> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| LyricError::validation(format!("ffprobe json parse failed: {e}")))?;
    let raw = parsed
        .format
        .duration
        .ok_or_else(|| LyricError::validation("ffprobe reported no duration"))?;
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| LyricError::validation(format!("invalid ffprobe duration \"{raw}\"")))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(LyricError::validation(format!(
            "invalid ffprobe duration {secs}"
        )));
    }
    Ok(secs)
}

#[cfg(test)]
#[path = "../../tests/unit/media/audio.rs"]
mod tests;
