use crate::foundation::error::{LyricError, LyricResult};
use crate::transcript::word::Word;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Speech-to-text collaborator producing timestamped words for an audio file.
///
/// Implementations are shared between jobs as `Arc<dyn Transcriber>`.
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio` into raw, not yet normalized, words.
    fn transcribe(&self, audio: &Path) -> LyricResult<Vec<Word>>;
}

/// Transcript already computed for the audio and stored as JSON.
///
/// Accepted shapes:
/// - a bare array of words `[{"text","start","end","confidence"?}]`
/// - an object `{"words": [...]}`
/// - a Whisper `word_timestamps` result `{"segments": [{"words": [{"word","start","end","probability"}]}]}`
#[derive(Clone, Debug)]
pub struct TranscriptFile {
    path: PathBuf,
}

impl TranscriptFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the transcript file.
    pub fn load(&self) -> LyricResult<Vec<Word>> {
        let file = std::fs::File::open(&self.path).map_err(|e| {
            LyricError::validation(format!(
                "failed to open transcript '{}': {e}",
                self.path.display()
            ))
        })?;
        parse_transcript_reader(std::io::BufReader::new(file))
    }
}

impl Transcriber for TranscriptFile {
    fn transcribe(&self, _audio: &Path) -> LyricResult<Vec<Word>> {
        self.load()
    }
}

#[derive(Deserialize)]
struct WordRepr {
    #[serde(alias = "word")]
    text: String,
    start: f64,
    end: f64,
    #[serde(default, alias = "probability")]
    confidence: Option<f64>,
}

#[derive(Deserialize)]
struct SegmentRepr {
    #[serde(default)]
    words: Vec<WordRepr>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptRepr {
    Bare(Vec<WordRepr>),
    Words { words: Vec<WordRepr> },
    Whisper { segments: Vec<SegmentRepr> },
}

/// Parse transcript JSON from a string.
pub fn parse_transcript_json(s: &str) -> LyricResult<Vec<Word>> {
    let repr: TranscriptRepr = serde_json::from_str(s)
        .map_err(|e| LyricError::validation(format!("invalid transcript json: {e}")))?;
    Ok(flatten(repr))
}

/// Parse transcript JSON from a reader.
pub fn parse_transcript_reader<R: Read>(reader: R) -> LyricResult<Vec<Word>> {
    let repr: TranscriptRepr = serde_json::from_reader(reader)
        .map_err(|e| LyricError::validation(format!("invalid transcript json: {e}")))?;
    Ok(flatten(repr))
}

fn flatten(repr: TranscriptRepr) -> Vec<Word> {
    let words = match repr {
        TranscriptRepr::Bare(words) | TranscriptRepr::Words { words } => words,
        TranscriptRepr::Whisper { segments } => {
            segments.into_iter().flat_map(|s| s.words).collect()
        }
    };
    words
        .into_iter()
        .map(|w| Word {
            text: w.text,
            start: w.start,
            end: w.end,
            confidence: w.confidence,
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/transcript/source.rs"]
mod tests;
