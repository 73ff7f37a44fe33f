// Session error types and constants

use crate::error::{ErrorCode, RecorderError};
use log::error;
use std::fmt;

/// Session error code constants
///
/// Error code range: 3001-3008. Recorder failures wrapped in
/// `SessionError::Recorder` keep the recorder's own code (4001-4002).
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Sentence source is malformed or missing required columns
    pub const CATALOG_FORMAT: i32 = 3001;

    /// Trial sequence exhausted (expected termination signal)
    pub const OUT_OF_TRIALS: i32 = 3002;

    /// Too few scored trials to estimate a threshold
    pub const INSUFFICIENT_DATA: i32 = 3003;

    /// List selection produced no trials
    pub const EMPTY_SESSION: i32 = 3004;

    /// A settings field could not be parsed into a typed value
    pub const INVALID_CONFIG: i32 = 3005;

    /// Word responses still contain unmarked words
    pub const UNMARKED_WORDS: i32 = 3006;

    /// Result requested before the trial sequence was exhausted
    pub const NOT_FINISHED: i32 = 3007;

    /// A scored trial is still waiting to be saved
    pub const PENDING_WRITE: i32 = 3008;
}

/// Log a session error with structured context
///
/// `OutOfTrials` is the normal end of a session and is logged at info level
/// instead of error level.
pub fn log_session_error(err: &SessionError, context: &str) {
    if err.is_terminal() {
        log::info!("[Session] {}: trial sequence exhausted", context);
        return;
    }
    error!(
        "Session error in {}: code={}, component=Session, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the catalog, the staircase, the estimator and the
/// session orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Malformed sentence source; fatal before any trial begins
    CatalogFormat { reason: String },

    /// No trial remains at the current index. This is the designed
    /// end-of-list signal, not a fault.
    OutOfTrials,

    /// Threshold requested with fewer levels than the estimator needs
    InsufficientData { required: usize, available: usize },

    /// The selected lists contain no sentences
    EmptySession,

    /// A settings field could not be parsed
    InvalidConfig { field: String, reason: String },

    /// Scoring was attempted with words left unmarked
    UnmarkedWords { words: Vec<String> },

    /// Result requested while trials remain
    NotFinished { remaining: usize },

    /// Trial `trial` (1-based) was scored but its record is not saved yet
    PendingWrite { trial: usize },

    /// Persisting a scored trial failed; the trial was not advanced
    Recorder(RecorderError),
}

impl SessionError {
    /// True for the expected end-of-trials signal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionError::OutOfTrials)
    }

    /// True when the caller may retry the same operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::Recorder(_)
                | SessionError::UnmarkedWords { .. }
                | SessionError::PendingWrite { .. }
        )
    }
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::CatalogFormat { .. } => SessionErrorCodes::CATALOG_FORMAT,
            SessionError::OutOfTrials => SessionErrorCodes::OUT_OF_TRIALS,
            SessionError::InsufficientData { .. } => SessionErrorCodes::INSUFFICIENT_DATA,
            SessionError::EmptySession => SessionErrorCodes::EMPTY_SESSION,
            SessionError::InvalidConfig { .. } => SessionErrorCodes::INVALID_CONFIG,
            SessionError::UnmarkedWords { .. } => SessionErrorCodes::UNMARKED_WORDS,
            SessionError::NotFinished { .. } => SessionErrorCodes::NOT_FINISHED,
            SessionError::PendingWrite { .. } => SessionErrorCodes::PENDING_WRITE,
            SessionError::Recorder(inner) => inner.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::CatalogFormat { reason } => {
                format!("Invalid sentence file: {}", reason)
            }
            SessionError::OutOfTrials => "No more trials in this session".to_string(),
            SessionError::InsufficientData {
                required,
                available,
            } => {
                format!(
                    "Insufficient data: need at least {} scored trials, got {}",
                    required, available
                )
            }
            SessionError::EmptySession => {
                "Selected lists contain no sentences. Check the list selection.".to_string()
            }
            SessionError::InvalidConfig { field, reason } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            SessionError::UnmarkedWords { words } => {
                format!(
                    "Every word must be marked before scoring (unmarked: {})",
                    words.join(", ")
                )
            }
            SessionError::NotFinished { remaining } => {
                format!("Session not finished: {} trials remaining", remaining)
            }
            SessionError::PendingWrite { trial } => {
                format!("Trial {} has not been saved yet; retry the write first", trial)
            }
            SessionError::Recorder(inner) => inner.message(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Recorder(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<RecorderError> for SessionError {
    fn from(err: RecorderError) -> Self {
        SessionError::Recorder(err)
    }
}
