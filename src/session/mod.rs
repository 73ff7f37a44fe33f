// Session - single-threaded orchestration of one HINT run
//
// Control flow per trial:
// 1. next_trial(): the handler selects the trial and its level
// 2. presentation happens outside the crate
// 3. submit(responses): score, persist, then advance the staircase
// 4. once next_trial() returns None, finish() computes the SRT
//
// A failed write keeps the scored outcome pending and the staircase where it
// was; retry_pending() re-attempts the same write.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationOffset;
use crate::catalog::TrialDefinition;
use crate::config::SessionConfig;
use crate::error::{log_session_error, SessionError};
use crate::recorder::{SessionRecorder, TrialRecord, TRIAL_RECORD_FIELDS};
use crate::scoring::{self, TrialOutcome, WordResponseSet};
use crate::staircase::{AdaptiveTrialHandler, StepReport, TrialProgress};

/// Identifies whose session this is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub subject: String,
    pub condition: String,
}

/// Final result of a completed session
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionResult {
    /// Speech reception threshold in dB SNR
    pub threshold_db_snr: f64,
    pub trials_scored: usize,
}

/// Trial handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentedTrial {
    pub trial: TrialDefinition,
    /// Desired speech level in dB SPL
    pub level_db: f64,
    /// Digital output level when a calibration offset is configured
    pub presentation_level_dbfs: Option<f64>,
    pub progress: TrialProgress,
}

/// Overall session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Running,
    /// Scored outcome waiting to be persisted
    PendingWrite,
    Finished,
    Cancelled,
}

struct PendingTrial {
    record: TrialRecord,
    outcome: TrialOutcome,
}

/// One HINT run: staircase, scorer and recorder wired together
pub struct Session<R: SessionRecorder> {
    config: SessionConfig,
    metadata: SessionMetadata,
    handler: AdaptiveTrialHandler,
    recorder: R,
    calibration: Option<CalibrationOffset>,
    pending: Option<PendingTrial>,
    cancelled: bool,
    result: Option<SessionResult>,
}

impl<R: SessionRecorder> Session<R> {
    /// Start a session over `trials`.
    ///
    /// # Errors
    /// `EmptySession` if the selection contains no trials.
    pub fn new(
        config: SessionConfig,
        metadata: SessionMetadata,
        trials: Vec<TrialDefinition>,
        recorder: R,
    ) -> Result<Self, SessionError> {
        if trials.is_empty() {
            let err = SessionError::EmptySession;
            log_session_error(&err, "session_start");
            return Err(err);
        }

        log::info!(
            "[Session] Starting session for subject={} condition={} ({} trials)",
            metadata.subject,
            metadata.condition,
            trials.len()
        );

        let handler = AdaptiveTrialHandler::new(trials, &config);
        Ok(Self {
            config,
            metadata,
            handler,
            recorder,
            calibration: None,
            pending: None,
            cancelled: false,
            result: None,
        })
    }

    /// Convert desired levels to digital output levels with `offset`
    pub fn with_calibration(mut self, offset: CalibrationOffset) -> Self {
        self.calibration = Some(offset);
        self
    }

    /// The next trial to present, or `None` once every trial is scored or
    /// the session was cancelled.
    ///
    /// # Errors
    /// `PendingWrite` while a scored trial still waits to be saved.
    pub fn next_trial(&mut self) -> Result<Option<PresentedTrial>, SessionError> {
        self.ensure_nothing_pending()?;
        if self.cancelled {
            return Ok(None);
        }

        let trial = match self.handler.current_trial() {
            Ok(trial) => trial.clone(),
            Err(err) if err.is_terminal() => {
                log_session_error(&err, "next_trial");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let level_db = self.handler.current_level_db();
        Ok(Some(PresentedTrial {
            trial,
            level_db,
            presentation_level_dbfs: self
                .calibration
                .map(|offset| offset.presentation_level_dbfs(level_db)),
            progress: self.handler.progress(),
        }))
    }

    /// Playback of the current trial started
    pub fn mark_presenting(&mut self) -> Result<(), SessionError> {
        self.handler.mark_presenting()
    }

    /// Playback finished; waiting for word marks
    pub fn mark_awaiting_response(&mut self) -> Result<(), SessionError> {
        self.handler.mark_awaiting_response()
    }

    /// Score the current trial, persist it, then advance the staircase.
    ///
    /// # Errors
    /// - `UnmarkedWords` if any word is still unmarked; nothing changes
    /// - `PendingWrite` if an earlier trial has not been saved yet
    /// - `OutOfTrials` if the session is finished or cancelled
    /// - `Recorder` if the write failed; the outcome stays pending and the
    ///   staircase does not move until `retry_pending` succeeds
    pub fn submit(&mut self, responses: &WordResponseSet) -> Result<TrialOutcome, SessionError> {
        self.ensure_nothing_pending()?;
        if self.cancelled {
            return Err(SessionError::OutOfTrials);
        }

        let unmarked = responses.unmarked();
        if !unmarked.is_empty() {
            return Err(SessionError::UnmarkedWords { words: unmarked });
        }

        let trial = self.handler.current_trial()?.clone();
        let trial_index = self.handler.trial_index();
        let outcome = scoring::score(responses);
        let record = TrialRecord::new(
            trial_index,
            &self.metadata,
            &trial,
            self.handler.current_level_db(),
            self.handler.step_for_trial(trial_index),
            &outcome,
        );

        self.flush(PendingTrial { record, outcome })
    }

    /// Re-attempt the write of a pending trial and advance on success.
    ///
    /// Returns `Ok(None)` when nothing is pending.
    pub fn retry_pending(&mut self) -> Result<Option<TrialOutcome>, SessionError> {
        match self.pending.take() {
            Some(pending) => self.flush(pending).map(Some),
            None => Ok(None),
        }
    }

    /// Scored outcome whose record has not been saved yet
    pub fn pending_outcome(&self) -> Option<&TrialOutcome> {
        self.pending.as_ref().map(|pending| &pending.outcome)
    }

    fn ensure_nothing_pending(&self) -> Result<(), SessionError> {
        match &self.pending {
            Some(pending) => Err(SessionError::PendingWrite {
                trial: pending.record.trial,
            }),
            None => Ok(()),
        }
    }

    fn flush(&mut self, pending: PendingTrial) -> Result<TrialOutcome, SessionError> {
        if let Err(err) = self
            .recorder
            .append(&pending.record.to_fields(), &TRIAL_RECORD_FIELDS)
        {
            let err = SessionError::from(err);
            log_session_error(&err, "save_trial");
            self.pending = Some(pending);
            return Err(err);
        }

        let report: StepReport = self.handler.advance(pending.outcome.outcome)?;
        log::info!(
            "[Session] Trial {} of {}: {:?} at {:.1} dB, next level {:.1} dB",
            report.trial_index + 1,
            self.handler.total_trials(),
            report.outcome,
            report.level_used_db,
            report.next_level_db
        );
        Ok(pending.outcome)
    }

    /// Stop presenting trials. Scored levels stay as recorded.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            log::info!(
                "[Session] Cancelled after {} of {} trials",
                self.handler.trial_index(),
                self.handler.total_trials()
            );
        }
        self.cancelled = true;
    }

    /// Compute the SRT once every trial is scored.
    ///
    /// # Errors
    /// - `NotFinished` while trials remain and the session was not cancelled
    /// - `InsufficientData` with fewer than five scored trials
    pub fn finish(&mut self) -> Result<SessionResult, SessionError> {
        if let Some(result) = self.result {
            return Ok(result);
        }
        if !self.handler.is_finished() && !self.cancelled {
            return Err(SessionError::NotFinished {
                remaining: self.handler.remaining_trials(),
            });
        }

        let history = self.handler.level_history();
        let threshold_db_snr = scoring::estimate(history, self.config.noise_level_db)
            .inspect_err(|err| log_session_error(err, "finish"))?;

        let result = SessionResult {
            threshold_db_snr,
            trials_scored: history.len(),
        };
        log::info!(
            "[Session] HINT score: {:.2} dB SNR over {} trials",
            result.threshold_db_snr,
            result.trials_scored
        );
        self.result = Some(result);
        Ok(result)
    }

    pub fn status(&self) -> SessionStatus {
        if self.pending.is_some() {
            SessionStatus::PendingWrite
        } else if self.handler.is_finished() {
            SessionStatus::Finished
        } else if self.cancelled {
            SessionStatus::Cancelled
        } else {
            SessionStatus::Running
        }
    }

    pub fn progress(&self) -> TrialProgress {
        self.handler.progress()
    }

    pub fn level_history(&self) -> &[f64] {
        self.handler.level_history()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn handler(&self) -> &AdaptiveTrialHandler {
        &self.handler
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    /// Mutable access to the recorder, e.g. to retarget a file after a
    /// failed write
    pub fn recorder_mut(&mut self) -> &mut R {
        &mut self.recorder
    }

    pub fn into_recorder(self) -> R {
        self.recorder
    }
}
