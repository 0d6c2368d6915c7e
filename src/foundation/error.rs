use std::fmt;
use std::time::Duration;

/// Result alias used across the crate.
pub type LyricResult<T> = Result<T, LyricError>;

/// Pipeline stage an aggregated job error is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Word stream normalization.
    Normalize,
    /// Line segmentation.
    Segment,
    /// Display window and highlight scheduling.
    Schedule,
    /// Background frame fetch.
    Background,
    /// Text overlay rendering and compositing.
    Render,
    /// Hand-off to the encoding collaborator.
    Encode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Normalize => "normalize",
            Stage::Segment => "segment",
            Stage::Schedule => "schedule",
            Stage::Background => "background",
            Stage::Render => "render",
            Stage::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// Where in the job a failure happened.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JobLocation {
    /// Output timestamp in seconds, for frame-level failures.
    pub t: Option<f64>,
    /// Line index, for planning failures.
    pub line: Option<usize>,
}

impl JobLocation {
    pub fn at_time(t: f64) -> Self {
        Self {
            t: Some(t),
            line: None,
        }
    }

    pub fn at_line(line: usize) -> Self {
        Self {
            t: None,
            line: Some(line),
        }
    }
}

impl fmt::Display for JobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.t, self.line) {
            (Some(t), Some(line)) => write!(f, " at t={t:.3}s (line {line})"),
            (Some(t), None) => write!(f, " at t={t:.3}s"),
            (None, Some(line)) => write!(f, " at line {line}"),
            (None, None) => Ok(()),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LyricError {
    #[error("malformed transcript at word {index}: {reason}")]
    MalformedTranscript { index: usize, reason: String },

    #[error("transcript contains no words")]
    EmptyTranscript,

    #[error("segmentation impossible: {0}")]
    SegmentationImpossible(String),

    #[error("invalid style config: {0}")]
    InvalidStyle(String),

    #[error("lines {first} and {second} cannot be scheduled: {reason}")]
    UnschedulableOverlap {
        first: usize,
        second: usize,
        reason: String,
    },

    #[error("background frame unavailable at t={t:.3}s: {reason}")]
    RenderTargetUnavailable { t: f64, reason: String },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("render job cancelled")]
    Cancelled,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("{stage} stage failed{location} (input {input_hash}): {source}")]
    Job {
        stage: Stage,
        location: JobLocation,
        input_hash: String,
        source: Box<LyricError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LyricError {
    pub fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedTranscript {
            index,
            reason: reason.into(),
        }
    }

    pub fn invalid_style(msg: impl Into<String>) -> Self {
        Self::InvalidStyle(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Wrap `self` as the aggregated error for a job stage.
    ///
    /// An error that is already a job error keeps its original attribution.
    pub fn in_stage(self, stage: Stage, location: JobLocation, input_hash: &str) -> Self {
        match self {
            err @ Self::Job { .. } => err,
            err => Self::Job {
                stage,
                location,
                input_hash: input_hash.to_owned(),
                source: Box::new(err),
            },
        }
    }

    /// Return `true` for failures worth retrying (timeouts, resource exhaustion).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient(_) | Self::Timeout { .. } => true,
            Self::Job { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Return the innermost error, looking through job aggregation.
    pub fn root(&self) -> &LyricError {
        match self {
            Self::Job { source, .. } => source.root(),
            err => err,
        }
    }

    /// Stage this error is attributed to, if it has been aggregated.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Job { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
