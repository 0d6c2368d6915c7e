use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{LyricError, LyricResult};
use crate::lines::segment::{BreakPolicy, SegmentOpts};
use crate::style::color::Color;
use crate::timing::schedule::ScheduleOpts;
use crate::transcript::normalize::NormalizeOpts;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Vertical placement of the text block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAnchor {
    Top,
    #[default]
    Center,
    Bottom,
}

/// One documented style option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StyleOption {
    pub name: &'static str,
    pub default: &'static str,
    pub effect: &'static str,
}

/// Every knob that affects segmentation, timing and rendering.
///
/// Loaded from JSON; missing keys take their defaults and unknown keys are rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleConfig {
    pub font: Option<PathBuf>,
    pub font_size_px: f32,
    pub revealed_color: Color,
    pub unrevealed_color: Color,
    pub transitioning_color: Color,
    pub background_color: Color,
    pub position: TextAnchor,
    pub margin_px: f32,
    pub max_text_width_px: f32,
    pub line_spacing: f32,
    pub max_chars: usize,
    pub max_duration: f64,
    pub break_on: BreakPolicy,
    pub lead_in: f64,
    pub lead_out: f64,
    pub min_gap: f64,
    pub reveal_epsilon: f64,
    pub crossfade_window: Option<f64>,
    pub transition_secs: f64,
    pub jitter_tolerance: f64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub strict_bounds: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            font: None,
            font_size_px: 70.0,
            revealed_color: Color::WHITE,
            unrevealed_color: Color::rgba(255, 255, 255, 128),
            transitioning_color: Color::rgba(255, 216, 74, 255),
            background_color: Color::rgba(0, 255, 0, 255),
            position: TextAnchor::Center,
            margin_px: 40.0,
            max_text_width_px: 1000.0,
            line_spacing: 1.2,
            max_chars: 32,
            max_duration: 4.0,
            break_on: BreakPolicy::Sentence,
            lead_in: 0.2,
            lead_out: 0.3,
            min_gap: 0.05,
            reveal_epsilon: 0.04,
            crossfade_window: None,
            transition_secs: 0.15,
            jitter_tolerance: 0.0,
            fps: 24,
            width: 1280,
            height: 720,
            strict_bounds: false,
        }
    }
}

impl StyleConfig {
    /// Option reference, in declaration order.
    pub const OPTIONS: &'static [StyleOption] = &[
        StyleOption {
            name: "font",
            default: "none",
            effect: "TTF/OTF file used for text; without one a block-glyph draft face is drawn",
        },
        StyleOption {
            name: "font_size_px",
            default: "70",
            effect: "text size in pixels",
        },
        StyleOption {
            name: "revealed_color",
            default: "#ffffff",
            effect: "color of words already sung",
        },
        StyleOption {
            name: "unrevealed_color",
            default: "#ffffff80",
            effect: "color of words not yet sung",
        },
        StyleOption {
            name: "transitioning_color",
            default: "#ffd84a",
            effect: "color a word starts from when revealed, fading to revealed_color",
        },
        StyleOption {
            name: "background_color",
            default: "#00ff00",
            effect: "solid background when no image or video is given",
        },
        StyleOption {
            name: "position",
            default: "center",
            effect: "vertical anchor of the text block: top, center or bottom",
        },
        StyleOption {
            name: "margin_px",
            default: "40",
            effect: "distance from the frame edge for top/bottom anchoring",
        },
        StyleOption {
            name: "max_text_width_px",
            default: "1000",
            effect: "width at which a line wraps onto another row",
        },
        StyleOption {
            name: "line_spacing",
            default: "1.2",
            effect: "row height as a multiple of font_size_px",
        },
        StyleOption {
            name: "max_chars",
            default: "32",
            effect: "maximum characters per line, spaces included",
        },
        StyleOption {
            name: "max_duration",
            default: "4.0",
            effect: "maximum seconds spanned by one line",
        },
        StyleOption {
            name: "break_on",
            default: "sentence",
            effect: "punctuation that closes a line early: sentence, clause or none",
        },
        StyleOption {
            name: "lead_in",
            default: "0.2",
            effect: "seconds a line appears before its first word",
        },
        StyleOption {
            name: "lead_out",
            default: "0.3",
            effect: "seconds a line lingers after its last word",
        },
        StyleOption {
            name: "min_gap",
            default: "0.05",
            effect: "minimum blank seconds between consecutive lines",
        },
        StyleOption {
            name: "reveal_epsilon",
            default: "0.04",
            effect: "spacing given to word reveals that would otherwise coincide",
        },
        StyleOption {
            name: "crossfade_window",
            default: "none",
            effect: "when set, consecutive lines overlap and crossfade for up to this many seconds",
        },
        StyleOption {
            name: "transition_secs",
            default: "0.15",
            effect: "duration of a word's color transition after its reveal",
        },
        StyleOption {
            name: "jitter_tolerance",
            default: "0.0",
            effect: "backwards timestamp steps up to this size are repaired instead of rejected",
        },
        StyleOption {
            name: "fps",
            default: "24",
            effect: "output frame rate",
        },
        StyleOption {
            name: "width",
            default: "1280",
            effect: "output width in pixels (even)",
        },
        StyleOption {
            name: "height",
            default: "720",
            effect: "output height in pixels (even)",
        },
        StyleOption {
            name: "strict_bounds",
            default: "false",
            effect: "fail instead of freezing the last frame when the background runs out",
        },
    ];

    /// Parse and validate a style from JSON text.
    pub fn from_json_str(s: &str) -> LyricResult<Self> {
        let style: Self = serde_json::from_str(s)
            .map_err(|e| LyricError::invalid_style(format!("style json: {e}")))?;
        style.validate()?;
        Ok(style)
    }

    /// Parse and validate a style from a JSON reader.
    pub fn from_reader<R: Read>(reader: R) -> LyricResult<Self> {
        let style: Self = serde_json::from_reader(reader)
            .map_err(|e| LyricError::invalid_style(format!("style json: {e}")))?;
        style.validate()?;
        Ok(style)
    }

    /// Parse and validate a style file.
    pub fn from_path(path: &Path) -> LyricResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            LyricError::invalid_style(format!("failed to open '{}': {e}", path.display()))
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Check rendering and timing options.
    ///
    /// `max_chars` and `max_duration` are left to the segmenter, which reports them as
    /// [`LyricError::SegmentationImpossible`].
    pub fn validate(&self) -> LyricResult<()> {
        if !self.font_size_px.is_finite() || self.font_size_px <= 0.0 {
            return Err(LyricError::invalid_style(
                "font_size_px must be finite and > 0",
            ));
        }
        if !self.margin_px.is_finite() || self.margin_px < 0.0 {
            return Err(LyricError::invalid_style("margin_px must be finite and >= 0"));
        }
        if !self.max_text_width_px.is_finite() || self.max_text_width_px <= 0.0 {
            return Err(LyricError::invalid_style(
                "max_text_width_px must be finite and > 0",
            ));
        }
        if !self.line_spacing.is_finite() || self.line_spacing <= 0.0 {
            return Err(LyricError::invalid_style(
                "line_spacing must be finite and > 0",
            ));
        }
        if !self.transition_secs.is_finite() || self.transition_secs < 0.0 {
            return Err(LyricError::invalid_style(
                "transition_secs must be finite and >= 0",
            ));
        }
        if !self.jitter_tolerance.is_finite() || self.jitter_tolerance < 0.0 {
            return Err(LyricError::invalid_style(
                "jitter_tolerance must be finite and >= 0",
            ));
        }
        if self.fps == 0 {
            return Err(LyricError::invalid_style("fps must be > 0"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(LyricError::invalid_style("width/height must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(LyricError::invalid_style(
                "width/height must be even (required for yuv420p output)",
            ));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(LyricError::invalid_style(
                "width/height must fit in 16 bits",
            ));
        }
        self.schedule_opts().validate()
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn fps(&self) -> LyricResult<Fps> {
        Fps::new(self.fps, 1).map_err(|e| LyricError::invalid_style(e.to_string()))
    }

    pub fn normalize_opts(&self) -> NormalizeOpts {
        NormalizeOpts {
            jitter_tolerance: self.jitter_tolerance,
        }
    }

    pub fn segment_opts(&self) -> SegmentOpts {
        SegmentOpts {
            max_chars: self.max_chars,
            max_duration: self.max_duration,
            break_on: self.break_on,
        }
    }

    pub fn schedule_opts(&self) -> ScheduleOpts {
        ScheduleOpts {
            lead_in: self.lead_in,
            lead_out: self.lead_out,
            min_gap: self.min_gap,
            reveal_epsilon: self.reveal_epsilon,
            crossfade_window: self.crossfade_window,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/style/config.rs"]
mod tests;
