// HINT Trainer Core - adaptive speech-in-noise testing
// One-down/one-up staircase, all-or-nothing sentence scoring, SRT estimation

// Module declarations
pub mod calibration;
pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod recorder;
pub mod scoring;
pub mod session;
pub mod staircase;

// Re-exports for convenience
pub use calibration::CalibrationOffset;
pub use catalog::{TrialCatalog, TrialDefinition, TrialOrder};
pub use config::{AppConfig, SessionConfig};
pub use error::{ErrorCode, RecorderError, SessionError};
pub use recorder::{CsvRecorder, MemoryRecorder, SessionRecorder, TrialRecord};
pub use scoring::{estimate, score, Outcome, TrialOutcome, WordMark, WordResponseSet};
pub use session::{PresentedTrial, Session, SessionMetadata, SessionResult, SessionStatus};
pub use staircase::{AdaptiveTrialHandler, StepSchedule, TrialProgress};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports_cover_a_session() {
        let config = SessionConfig::new(
            [1].into_iter().collect(),
            StepSchedule::new(vec![4, 2]).unwrap(),
            65.0,
            65.0,
        );
        let trials = vec![TrialDefinition {
            list_number: 1,
            sentence_number: 1,
            sentence_text: "a boy fell".to_string(),
            audio_file: "s0101.wav".to_string(),
        }];
        let metadata = SessionMetadata {
            subject: "999".to_string(),
            condition: "test".to_string(),
        };
        let session = Session::new(config, metadata, trials, MemoryRecorder::new()).unwrap();
        assert_eq!(session.status(), SessionStatus::Running);
    }
}
