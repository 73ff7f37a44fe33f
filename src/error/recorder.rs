// Recorder error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Recorder error code constants
///
/// Error code range: 4001-4002
pub struct RecorderErrorCodes {}

impl RecorderErrorCodes {
    /// Destination exists but cannot be written
    pub const ACCESS_DENIED: i32 = 4001;

    /// Destination file or directory cannot be reached
    pub const DESTINATION_UNAVAILABLE: i32 = 4002;
}

/// Log a recorder error with structured context
pub fn log_recorder_error(err: &RecorderError, context: &str) {
    error!(
        "Recorder error in {}: code={}, component=SessionRecorder, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Persistence failures raised while appending trial records.
///
/// Both variants are recoverable: the caller may retry the same write or
/// point the recorder at a different destination. A failed append never
/// touches rows that were already written.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderError {
    /// The destination exists but the process may not write to it
    AccessDenied { path: PathBuf, details: String },

    /// The destination (or its directory) could not be opened or created
    DestinationUnavailable { path: PathBuf, details: String },
}

impl RecorderError {
    /// Classify an I/O failure for the given destination.
    pub fn from_io(path: &Path, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => RecorderError::AccessDenied {
                path: path.to_path_buf(),
                details: err.to_string(),
            },
            _ => RecorderError::DestinationUnavailable {
                path: path.to_path_buf(),
                details: err.to_string(),
            },
        }
    }

    /// Destination the failed write was aimed at
    pub fn path(&self) -> &Path {
        match self {
            RecorderError::AccessDenied { path, .. } => path,
            RecorderError::DestinationUnavailable { path, .. } => path,
        }
    }
}

impl ErrorCode for RecorderError {
    fn code(&self) -> i32 {
        match self {
            RecorderError::AccessDenied { .. } => RecorderErrorCodes::ACCESS_DENIED,
            RecorderError::DestinationUnavailable { .. } => {
                RecorderErrorCodes::DESTINATION_UNAVAILABLE
            }
        }
    }

    fn message(&self) -> String {
        match self {
            RecorderError::AccessDenied { path, details } => {
                format!(
                    "Data not saved! Cannot write to {}: {}",
                    path.display(),
                    details
                )
            }
            RecorderError::DestinationUnavailable { path, details } => {
                format!(
                    "Cannot find file or directory {}: {}",
                    path.display(),
                    details
                )
            }
        }
    }
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RecorderError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for RecorderError {}
