use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SwoopError {
    #[error("{0} cannot be empty")]
    EmptySeries(String),
    #[error("{name} contains a non-finite value at index {index}")]
    NonFiniteSample { name: String, index: usize },
    #[error("column {0} not found in trajectory")]
    MissingColumn(String),
    #[error("column {column} has {found} samples, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("index {index} is out of bounds for trajectory of {len} samples")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("invalid sample range {start}..{stop} for trajectory of {len} samples")]
    InvalidRange {
        start: usize,
        stop: usize,
        len: usize,
    },
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("no sample with timestamp {0}")]
    TimestampNotFound(f64),

    #[error("missing category '{0}' in thresholds")]
    MissingCategory(String),
    #[error("missing keys in '{category}' thresholds: {}", keys.join(", "))]
    MissingThresholdKeys { category: String, keys: Vec<String> },
    #[error("malformed threshold at '{path}': {reason}")]
    MalformedThreshold { path: String, reason: String },
    #[error("threshold '{key}' not found in category '{category}'")]
    ThresholdNotFound { category: String, key: String },
    #[error("invalid pattern elevations: {0}")]
    InvalidPatternElevations(String),
    #[error("point after initiation can't be less than 0 (got {0})")]
    NegativePointAfterInitiation(i64),
    #[error("invalid {kind} unit '{value}', expected one of {expected}")]
    InvalidUnit {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("event name '{0}' is not a known key event")]
    UnknownEvent(String),

    #[error("no peaks found in the {0} metric")]
    NoPeaks(String),
    #[error("no lows found in the {0} metric")]
    NoLows(String),
    #[error("event '{0}' was not detected")]
    EventNotDetected(String),
}

/// Coarse classification used by presentation layers to decide how to report a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Configuration,
    Detection,
}

impl SwoopError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwoopError::EmptySeries(_)
            | SwoopError::NonFiniteSample { .. }
            | SwoopError::MissingColumn(_)
            | SwoopError::LengthMismatch { .. }
            | SwoopError::IndexOutOfBounds { .. }
            | SwoopError::InvalidRange { .. }
            | SwoopError::InsufficientData(_)
            | SwoopError::TimestampNotFound(_) => ErrorKind::InvalidInput,
            SwoopError::MissingCategory(_)
            | SwoopError::MissingThresholdKeys { .. }
            | SwoopError::MalformedThreshold { .. }
            | SwoopError::ThresholdNotFound { .. }
            | SwoopError::InvalidPatternElevations(_)
            | SwoopError::NegativePointAfterInitiation(_)
            | SwoopError::InvalidUnit { .. }
            | SwoopError::InvalidParameter(_)
            | SwoopError::UnknownEvent(_) => ErrorKind::Configuration,
            SwoopError::NoPeaks(_) | SwoopError::NoLows(_) | SwoopError::EventNotDetected(_) => {
                ErrorKind::Detection
            }
        }
    }
}
