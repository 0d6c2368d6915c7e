//! Subtitle generation in SRT and VTT formats.
//!
//! Cues use each line's display window, so players show the same lines at the same times as
//! the rendered video.

use crate::foundation::error::{LyricError, LyricResult};
use crate::timing::schedule::ScheduledLine;
use std::path::Path;

/// Sidecar format, usually picked from a file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Json,
}

impl SubtitleFormat {
    /// Format for `path`'s extension; anything unknown is SRT.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("vtt") => Self::Vtt,
            Some("json") => Self::Json,
            _ => Self::Srt,
        }
    }
}

/// Generate SRT subtitle content.
pub fn to_srt(lines: &[ScheduledLine]) -> String {
    let mut output = String::new();

    for (i, line) in lines.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(line.display_start),
            format_srt_time(line.display_end),
        ));
        output.push_str(&line.line.text());
        output.push_str("\n\n");
    }

    output
}

/// Generate WebVTT subtitle content.
pub fn to_vtt(lines: &[ScheduledLine]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for line in lines {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(line.display_start),
            format_vtt_time(line.display_end),
        ));
        output.push_str(&line.line.text());
        output.push_str("\n\n");
    }

    output
}

/// Pretty JSON of the full schedule, words and reveal times included.
pub fn to_json(lines: &[ScheduledLine]) -> LyricResult<String> {
    serde_json::to_string_pretty(lines)
        .map_err(|e| LyricError::validation(format!("failed to serialize lines: {e}")))
}

pub fn render_subtitles(lines: &[ScheduledLine], format: SubtitleFormat) -> LyricResult<String> {
    match format {
        SubtitleFormat::Srt => Ok(to_srt(lines)),
        SubtitleFormat::Vtt => Ok(to_vtt(lines)),
        SubtitleFormat::Json => to_json(lines),
    }
}

/// Write subtitles to `path`, choosing the format from its extension.
pub fn save_subtitles(lines: &[ScheduledLine], path: &Path) -> LyricResult<()> {
    let content = render_subtitles(lines, SubtitleFormat::from_path(path))?;
    std::fs::write(path, content).map_err(|e| {
        LyricError::Other(anyhow::anyhow!(
            "failed to write subtitles to '{}': {e}",
            path.display()
        ))
    })
}

fn split_ms(secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    (
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000,
    )
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
fn format_srt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_ms(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
fn format_vtt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_ms(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

#[cfg(test)]
#[path = "../../tests/unit/export/subtitles.rs"]
mod tests;
