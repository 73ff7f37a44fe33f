// Error types for the HINT trainer
//
// This module defines the error taxonomy for the adaptive session core and
// the trial recorder, providing structured error handling with stable error
// codes for the CLI and any other front end.

mod recorder;
mod session;

pub use recorder::{log_recorder_error, RecorderError, RecorderErrorCodes};
pub use session::{log_session_error, SessionError, SessionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// front ends.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
