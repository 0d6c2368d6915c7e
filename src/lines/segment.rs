use crate::foundation::error::{LyricError, LyricResult};
use crate::transcript::word::Word;
use serde::{Deserialize, Serialize};

/// Which trailing punctuation closes a line early.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakPolicy {
    /// Break after `.`, `!`, `?` and `…`.
    #[default]
    Sentence,
    /// Sentence breaks plus `,`, `;`, `:` and `—`.
    Clause,
    /// Only the length and duration limits break lines.
    None,
}

impl BreakPolicy {
    fn break_chars(self) -> &'static [char] {
        match self {
            BreakPolicy::Sentence => &['.', '!', '?', '…'],
            BreakPolicy::Clause => &['.', '!', '?', '…', ',', ';', ':', '—'],
            BreakPolicy::None => &[],
        }
    }

    /// Return `true` when a line should close after a word with this text.
    pub fn breaks_after(self, text: &str) -> bool {
        let chars = self.break_chars();
        if chars.is_empty() {
            return false;
        }
        let trimmed = text.trim_end_matches(['"', '\'', '”', '’', ')', ']', '»']);
        trimmed.chars().next_back().is_some_and(|c| chars.contains(&c))
    }
}

/// Limits a line is built under.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentOpts {
    /// Maximum characters per line, counting the single spaces between words.
    pub max_chars: usize,
    /// Maximum seconds from the first word's start to the last word's end.
    pub max_duration: f64,
    /// Punctuation that closes a line early.
    pub break_on: BreakPolicy,
}

impl Default for SegmentOpts {
    fn default() -> Self {
        Self {
            max_chars: 32,
            max_duration: 4.0,
            break_on: BreakPolicy::Sentence,
        }
    }
}

/// A contiguous run of words shown together.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Line {
    /// Words in order; never empty.
    pub words: Vec<Word>,
    /// Index of `words[0]` in the normalized word stream.
    pub first_word_index: usize,
    /// `max_chars` this line was built under.
    pub max_chars: usize,
    /// `max_duration` this line was built under.
    pub max_duration: f64,
}

impl Line {
    /// Start of the first word.
    pub fn start(&self) -> f64 {
        self.words.first().map_or(0.0, |w| w.start)
    }

    /// End of the last word.
    pub fn end(&self) -> f64 {
        self.words.last().map_or(0.0, |w| w.end)
    }

    /// Words joined by single spaces.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, w) in self.words.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&w.text);
        }
        out
    }

    /// Character count of [`Line::text`].
    pub fn char_count(&self) -> usize {
        let chars: usize = self.words.iter().map(Word::char_len).sum();
        chars + self.words.len().saturating_sub(1)
    }
}

/// Greedily group `words` into lines.
///
/// Every input word lands in exactly one line, in order. A word that alone exceeds
/// the limits forms its own line.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(words = words.len(), max_chars = opts.max_chars)
)]
pub fn segment_words(words: &[Word], opts: &SegmentOpts) -> LyricResult<Vec<Line>> {
    if opts.max_chars < 1 {
        return Err(LyricError::SegmentationImpossible(
            "max_chars must be >= 1".to_owned(),
        ));
    }
    if !opts.max_duration.is_finite() || opts.max_duration <= 0.0 {
        return Err(LyricError::SegmentationImpossible(format!(
            "max_duration must be finite and > 0, got {}",
            opts.max_duration
        )));
    }

    let mut lines = Vec::<Line>::new();
    let mut current = Vec::<Word>::new();
    let mut current_chars = 0usize;
    let mut first_index = 0usize;

    for (i, w) in words.iter().enumerate() {
        let len = w.char_len();
        let fits = match current.first() {
            None => true,
            Some(first) => {
                let prev_breaks = current
                    .last()
                    .is_some_and(|prev| opts.break_on.breaks_after(&prev.text));
                !prev_breaks
                    && current_chars + 1 + len <= opts.max_chars
                    && w.end - first.start <= opts.max_duration
            }
        };

        if !fits {
            lines.push(Line {
                words: std::mem::take(&mut current),
                first_word_index: first_index,
                max_chars: opts.max_chars,
                max_duration: opts.max_duration,
            });
            current_chars = 0;
        }

        if current.is_empty() {
            first_index = i;
            current_chars = len;
        } else {
            current_chars += 1 + len;
        }
        current.push(w.clone());
    }

    if !current.is_empty() {
        lines.push(Line {
            words: current,
            first_word_index: first_index,
            max_chars: opts.max_chars,
            max_duration: opts.max_duration,
        });
    }

    tracing::debug!(lines = lines.len(), "segmented words");
    Ok(lines)
}

#[cfg(test)]
#[path = "../../tests/unit/lines/segment.rs"]
mod tests;
