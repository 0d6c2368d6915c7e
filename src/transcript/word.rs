use serde::{Deserialize, Serialize};

/// One transcribed word with its timing in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Word text as spoken (may carry punctuation).
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds, `>= start`.
    pub end: f64,
    /// Recognition confidence in `[0,1]`, when the transcriber reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Word {
    /// Convenience constructor without a confidence value.
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            confidence: None,
        }
    }

    /// Word duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Length in Unicode scalar values.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
