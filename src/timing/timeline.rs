use crate::timing::schedule::ScheduledLine;
use smallvec::SmallVec;

/// A line visible at some instant, with its blend opacity.
#[derive(Clone, Copy, Debug)]
pub struct ActiveLine<'a> {
    /// Index into the schedule.
    pub index: usize,
    pub line: &'a ScheduledLine,
    /// `1.0` except while two lines crossfade.
    pub opacity: f64,
}

/// Highlight state of one word at an instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WordState {
    Unrevealed,
    /// Progress through the reveal transition, in `[0,1)`.
    Transitioning(f64),
    Revealed,
}

/// Lines visible at `t`, in schedule order.
///
/// `lines` must come from [`schedule_lines`](crate::timing::schedule::schedule_lines), whose
/// display starts are non-decreasing and which never shows more than two lines at once.
/// When two lines are visible the earlier fades out linearly across the overlap while the
/// later fades in.
pub fn active_lines(lines: &[ScheduledLine], t: f64) -> SmallVec<[ActiveLine<'_>; 2]> {
    let end = lines.partition_point(|l| l.display_start <= t);
    let begin = end.saturating_sub(2);

    let mut out = SmallVec::<[ActiveLine<'_>; 2]>::new();
    for (index, line) in lines.iter().enumerate().take(end).skip(begin) {
        if line.is_visible(t) {
            out.push(ActiveLine {
                index,
                line,
                opacity: 1.0,
            });
        }
    }

    if out.len() == 2 {
        let fade_start = out[1].line.display_start;
        let fade_end = out[0].line.display_end;
        let span = fade_end - fade_start;
        let p = if span > 0.0 {
            ((t - fade_start) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        out[0].opacity = 1.0 - p;
        out[1].opacity = p;
    }
    out
}

/// State of a word revealed at `reveal` when observed at `t`.
pub fn word_state(reveal: f64, t: f64, transition_secs: f64) -> WordState {
    if t < reveal {
        return WordState::Unrevealed;
    }
    if transition_secs > 0.0 {
        let p = (t - reveal) / transition_secs;
        if p < 1.0 {
            return WordState::Transitioning(p);
        }
    }
    WordState::Revealed
}

/// Length of the output timeline: the audio duration or the last display end, whichever is later.
pub fn total_duration(lines: &[ScheduledLine], audio_duration: Option<f64>) -> f64 {
    let lyrics_end = lines
        .iter()
        .map(|l| l.display_end)
        .fold(0.0_f64, f64::max);
    match audio_duration {
        Some(d) if d.is_finite() => d.max(lyrics_end),
        _ => lyrics_end,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timing/timeline.rs"]
mod tests;
