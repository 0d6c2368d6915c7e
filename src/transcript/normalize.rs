use crate::foundation::error::{LyricError, LyricResult};
use crate::transcript::word::Word;

/// Options for [`normalize_words`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizeOpts {
    /// Largest backwards step of `start` (seconds) repaired instead of rejected.
    ///
    /// `0.0` means strictly monotonic input is required.
    pub jitter_tolerance: f64,
}

impl Default for NormalizeOpts {
    fn default() -> Self {
        Self {
            jitter_tolerance: 0.0,
        }
    }
}

/// Clean and validate a raw word stream.
///
/// Output words have non-empty single-spaced text, finite non-negative timestamps with
/// `start <= end`, and starts in non-decreasing order. Small backwards steps within
/// `jitter_tolerance` are clamped to the previous start.
#[tracing::instrument(level = "debug", skip_all, fields(words = raw.len()))]
pub fn normalize_words(raw: &[Word], opts: &NormalizeOpts) -> LyricResult<Vec<Word>> {
    if !opts.jitter_tolerance.is_finite() || opts.jitter_tolerance < 0.0 {
        return Err(LyricError::validation(
            "jitter_tolerance must be finite and >= 0",
        ));
    }
    if raw.is_empty() {
        return Err(LyricError::EmptyTranscript);
    }

    let mut out = Vec::<Word>::with_capacity(raw.len());
    let mut repaired = 0usize;
    for (index, w) in raw.iter().enumerate() {
        if !w.start.is_finite() || !w.end.is_finite() {
            return Err(LyricError::malformed(index, "timestamp is not finite"));
        }
        if w.start < 0.0 || w.end < 0.0 {
            return Err(LyricError::malformed(index, "timestamp is negative"));
        }
        if w.start > w.end {
            return Err(LyricError::malformed(
                index,
                format!("start {} is after end {}", w.start, w.end),
            ));
        }
        if let Some(c) = w.confidence
            && !(0.0..=1.0).contains(&c)
        {
            return Err(LyricError::malformed(
                index,
                format!("confidence {c} outside [0,1]"),
            ));
        }

        let text = clean_text(&w.text);
        if text.is_empty() {
            return Err(LyricError::malformed(index, "text is empty after cleaning"));
        }

        let mut start = w.start;
        let mut end = w.end;
        if let Some(prev) = out.last()
            && start < prev.start
        {
            let step = prev.start - start;
            if step > opts.jitter_tolerance {
                return Err(LyricError::malformed(
                    index,
                    format!(
                        "start regresses by {step:.3}s (tolerance {:.3}s)",
                        opts.jitter_tolerance
                    ),
                ));
            }
            start = prev.start;
            end = end.max(start);
            repaired += 1;
        }

        out.push(Word {
            text,
            start,
            end,
            confidence: w.confidence,
        });
    }

    if repaired > 0 {
        tracing::debug!(repaired, "clamped jittered word starts");
    }
    Ok(out)
}

/// Strip control characters, collapse whitespace runs to one space and trim.
pub(crate) fn clean_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for part in s.split_whitespace() {
        let part: String = part.chars().filter(|c| !c.is_control()).collect();
        if part.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&part);
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/transcript/normalize.rs"]
mod tests;
