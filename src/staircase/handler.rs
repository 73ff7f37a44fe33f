// AdaptiveTrialHandler - one-down/one-up staircase over a trial sequence
//
// The handler owns the staircase state and is its only writer. Each scored
// trial goes through `advance`, which:
// 1. records the level the trial was presented at
// 2. looks up the step for the current trial index
// 3. raises the level after a fail, lowers it after a pass
// 4. moves to the next trial, finishing once the sequence is exhausted

use serde::Serialize;

use crate::catalog::TrialDefinition;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::scoring::Outcome;
use crate::staircase::StepSchedule;

/// Lifecycle phase of the current trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandlerPhase {
    /// Trial selected, not yet presented
    Ready,
    /// Audio playing
    Presenting,
    /// Playback finished, waiting for word marks
    AwaitingResponse,
    /// Trial sequence exhausted
    Finished,
}

/// Mutable staircase state; only `AdaptiveTrialHandler::advance` changes it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaircaseState {
    /// 0-based index of the trial being presented
    pub trial_index: usize,
    /// Level (dB) the current trial is presented at
    pub current_level_db: f64,
    /// Level used for each scored trial, in trial order
    pub level_history: Vec<f64>,
    pub last_outcome: Option<Outcome>,
}

/// What a single `advance` call did
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepReport {
    /// Index of the trial that was scored
    pub trial_index: usize,
    pub outcome: Outcome,
    /// Level the scored trial was presented at
    pub level_used_db: f64,
    pub step_db: u32,
    /// Level for the next trial
    pub next_level_db: f64,
    pub finished: bool,
}

/// Progress snapshot for display ("3 of 20")
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialProgress {
    /// 1-based trial number
    pub trial_number: usize,
    pub total_trials: usize,
    pub current_level_db: f64,
    pub step_db: u32,
    pub phase: HandlerPhase,
}

/// Staircase state machine over a fixed trial sequence
pub struct AdaptiveTrialHandler {
    trials: Vec<TrialDefinition>,
    schedule: StepSchedule,
    state: StaircaseState,
    phase: HandlerPhase,
}

impl AdaptiveTrialHandler {
    /// Create a handler starting at `config.starting_level_db`.
    ///
    /// An empty trial sequence yields a handler that is already finished.
    pub fn new(trials: Vec<TrialDefinition>, config: &SessionConfig) -> Self {
        Self::with_schedule(trials, config.step_sizes.clone(), config.starting_level_db)
    }

    pub fn with_schedule(
        trials: Vec<TrialDefinition>,
        schedule: StepSchedule,
        starting_level_db: f64,
    ) -> Self {
        let phase = if trials.is_empty() {
            HandlerPhase::Finished
        } else {
            HandlerPhase::Ready
        };

        log::info!(
            "[TrialHandler] {} trials, start level {:.1} dB, steps {:?}",
            trials.len(),
            starting_level_db,
            schedule.steps()
        );

        Self {
            trials,
            schedule,
            state: StaircaseState {
                trial_index: 0,
                current_level_db: starting_level_db,
                level_history: Vec::new(),
                last_outcome: None,
            },
            phase,
        }
    }

    /// Trial at the current index.
    ///
    /// # Errors
    /// `OutOfTrials` once every trial has been scored. This is the normal
    /// end of a session.
    pub fn current_trial(&self) -> Result<&TrialDefinition, SessionError> {
        self.trials
            .get(self.state.trial_index)
            .ok_or(SessionError::OutOfTrials)
    }

    /// Apply the staircase step for the trial just scored.
    ///
    /// # Errors
    /// `OutOfTrials` if the handler is already finished; state is untouched.
    pub fn advance(&mut self, outcome: Outcome) -> Result<StepReport, SessionError> {
        if self.is_finished() {
            return Err(SessionError::OutOfTrials);
        }

        let trial_index = self.state.trial_index;
        let level_used_db = self.state.current_level_db;
        self.state.level_history.push(level_used_db);

        let step_db = self.schedule.step_for_trial(trial_index);
        let next_level_db = match outcome {
            Outcome::Fail => level_used_db + f64::from(step_db),
            Outcome::Pass => level_used_db - f64::from(step_db),
        };
        self.state.current_level_db = next_level_db;
        self.state.last_outcome = Some(outcome);
        self.state.trial_index += 1;

        let finished = self.state.trial_index == self.trials.len();
        self.phase = if finished {
            HandlerPhase::Finished
        } else {
            HandlerPhase::Ready
        };

        tracing::debug!(
            "[TrialHandler] trial {} {:?}: {:.1} dB -> {:.1} dB (step {})",
            trial_index + 1,
            outcome,
            level_used_db,
            next_level_db,
            step_db
        );
        if finished {
            log::info!(
                "[TrialHandler] All {} trials scored, final level {:.1} dB",
                self.trials.len(),
                next_level_db
            );
        }

        Ok(StepReport {
            trial_index,
            outcome,
            level_used_db,
            step_db,
            next_level_db,
            finished,
        })
    }

    /// Current trial is being played back.
    pub fn mark_presenting(&mut self) -> Result<(), SessionError> {
        self.transition(HandlerPhase::Presenting)
    }

    /// Playback finished; responses are being collected.
    pub fn mark_awaiting_response(&mut self) -> Result<(), SessionError> {
        self.transition(HandlerPhase::AwaitingResponse)
    }

    fn transition(&mut self, phase: HandlerPhase) -> Result<(), SessionError> {
        if self.is_finished() {
            return Err(SessionError::OutOfTrials);
        }
        self.phase = phase;
        Ok(())
    }

    /// Step that will be applied once trial `trial_index` is scored
    pub fn step_for_trial(&self, trial_index: usize) -> u32 {
        self.schedule.step_for_trial(trial_index)
    }

    pub fn progress(&self) -> TrialProgress {
        TrialProgress {
            trial_number: (self.state.trial_index + 1).min(self.trials.len()),
            total_trials: self.trials.len(),
            current_level_db: self.state.current_level_db,
            step_db: self.schedule.step_for_trial(self.state.trial_index),
            phase: self.phase,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase == HandlerPhase::Finished
    }

    pub fn phase(&self) -> HandlerPhase {
        self.phase
    }

    pub fn state(&self) -> &StaircaseState {
        &self.state
    }

    pub fn trial_index(&self) -> usize {
        self.state.trial_index
    }

    pub fn current_level_db(&self) -> f64 {
        self.state.current_level_db
    }

    pub fn level_history(&self) -> &[f64] {
        &self.state.level_history
    }

    pub fn total_trials(&self) -> usize {
        self.trials.len()
    }

    pub fn remaining_trials(&self) -> usize {
        self.trials.len() - self.state.trial_index
    }

    pub fn schedule(&self) -> &StepSchedule {
        &self.schedule
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
