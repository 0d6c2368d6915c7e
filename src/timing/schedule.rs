use crate::foundation::error::{LyricError, LyricResult};
use crate::lines::segment::Line;
use serde::Serialize;

/// Scheduler parameters (seconds).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduleOpts {
    /// How early a line appears before its first word.
    pub lead_in: f64,
    /// How long a line stays after its last word.
    pub lead_out: f64,
    /// Minimum separation between consecutive lines (ignored in crossfade mode).
    pub min_gap: f64,
    /// Spacing applied to reveal times that would otherwise tie.
    pub reveal_epsilon: f64,
    /// When set, consecutive lines may overlap by up to this many seconds.
    pub crossfade_window: Option<f64>,
}

impl Default for ScheduleOpts {
    fn default() -> Self {
        Self {
            lead_in: 0.2,
            lead_out: 0.3,
            min_gap: 0.05,
            reveal_epsilon: 0.04,
            crossfade_window: None,
        }
    }
}

impl ScheduleOpts {
    pub(crate) fn validate(&self) -> LyricResult<()> {
        for (name, v) in [
            ("lead_in", self.lead_in),
            ("lead_out", self.lead_out),
            ("min_gap", self.min_gap),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(LyricError::invalid_style(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        if !self.reveal_epsilon.is_finite() || self.reveal_epsilon <= 0.0 {
            return Err(LyricError::invalid_style(
                "reveal_epsilon must be finite and > 0",
            ));
        }
        if let Some(w) = self.crossfade_window
            && (!w.is_finite() || w <= 0.0)
        {
            return Err(LyricError::invalid_style(
                "crossfade_window must be finite and > 0 when set",
            ));
        }
        Ok(())
    }
}

/// Moment a word switches to its highlighted state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Reveal {
    /// Index of the word within its line.
    pub word_index: usize,
    /// Reveal time in seconds.
    pub time: f64,
}

/// A line with its display window and per-word reveal times.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScheduledLine {
    pub line: Line,
    pub display_start: f64,
    pub display_end: f64,
    /// One entry per word, strictly increasing in both index and time.
    pub highlight_timeline: Vec<Reveal>,
}

impl ScheduledLine {
    /// Return `true` when `t` falls in `[display_start, display_end)`.
    pub fn is_visible(&self, t: f64) -> bool {
        self.display_start <= t && t < self.display_end
    }

    pub fn reveal_time(&self, word_index: usize) -> Option<f64> {
        self.highlight_timeline.get(word_index).map(|r| r.time)
    }
}

/// Assign display windows and reveal times to `lines`.
///
/// Without a crossfade window consecutive lines never overlap and are separated by at
/// least `min_gap`. With one, neighbours overlap by at most the window and no more than
/// two lines are visible at once.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(lines = lines.len(), crossfade = opts.crossfade_window.is_some())
)]
pub fn schedule_lines(lines: &[Line], opts: &ScheduleOpts) -> LyricResult<Vec<ScheduledLine>> {
    opts.validate()?;

    let mut out = Vec::<ScheduledLine>::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let next = lines.get(i + 1);
        let (display_start, display_end) = match opts.crossfade_window {
            None => normal_window(line, next, out.last(), opts),
            Some(w) => {
                let prevprev = i.checked_sub(2).and_then(|j| out.get(j));
                crossfade_window(line, next, out.last(), prevprev, opts, w)
            }
        };

        if display_start.is_nan() || display_end.is_nan() || display_end < display_start {
            let (first, second) = if i > 0 && display_start > line.start() {
                (i - 1, i)
            } else {
                (i, i + 1)
            };
            return Err(LyricError::UnschedulableOverlap {
                first,
                second,
                reason: format!(
                    "display window inverts ({display_start:.3}s > {display_end:.3}s)"
                ),
            });
        }

        let highlight_timeline = reveal_times(line, display_start, display_end, opts)
            .ok_or_else(|| LyricError::UnschedulableOverlap {
                first: i,
                second: i,
                reason: format!(
                    "{} words cannot be revealed {:.3}s apart before {display_end:.3}s",
                    line.words.len(),
                    opts.reveal_epsilon
                ),
            })?;

        out.push(ScheduledLine {
            line: line.clone(),
            display_start,
            display_end,
            highlight_timeline,
        });
    }

    Ok(out)
}

fn normal_window(
    line: &Line,
    next: Option<&Line>,
    prev: Option<&ScheduledLine>,
    opts: &ScheduleOpts,
) -> (f64, f64) {
    let mut start = (line.start() - opts.lead_in).max(0.0);
    if let Some(prev) = prev {
        start = start.max(prev.display_end + opts.min_gap);
    }
    let mut end = line.end() + opts.lead_out;
    if let Some(next) = next {
        end = end.min(next.start() - opts.min_gap);
    }
    (start, end)
}

fn crossfade_window(
    line: &Line,
    next: Option<&Line>,
    prev: Option<&ScheduledLine>,
    prevprev: Option<&ScheduledLine>,
    opts: &ScheduleOpts,
    window: f64,
) -> (f64, f64) {
    let mut start = (line.start() - opts.lead_in).max(0.0);
    if let Some(prev) = prev {
        start = start
            .max(prev.display_end - window)
            .max(prev.display_start);
    }
    if let Some(prevprev) = prevprev {
        start = start.max(prevprev.display_end);
    }
    let mut end = line.end() + opts.lead_out;
    if let Some(next) = next {
        end = end.min(next.start() + window);
    }
    (start, end)
}

fn reveal_times(line: &Line, start: f64, end: f64, opts: &ScheduleOpts) -> Option<Vec<Reveal>> {
    let mut out = Vec::<Reveal>::with_capacity(line.words.len());
    let mut prev: Option<f64> = None;
    for (word_index, w) in line.words.iter().enumerate() {
        let mut time = w.start.clamp(start, end);
        if let Some(p) = prev
            && time <= p
        {
            time = p + opts.reveal_epsilon;
        }
        if time > end {
            return None;
        }
        prev = Some(time);
        out.push(Reveal { word_index, time });
    }
    Some(out)
}

#[cfg(test)]
#[path = "../../tests/unit/timing/schedule.rs"]
mod tests;
