use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Decreasing step-size schedule for the staircase.
///
/// Trial `i` uses `steps[min(i, len - 1)]`: once the schedule runs out the
/// last step repeats for every remaining trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct StepSchedule {
    steps: Vec<u32>,
}

impl StepSchedule {
    /// # Errors
    /// `InvalidConfig` for an empty schedule.
    pub fn new(steps: Vec<u32>) -> Result<Self, SessionError> {
        if steps.is_empty() {
            return Err(SessionError::InvalidConfig {
                field: "step_sizes".to_string(),
                reason: "at least one step size is required".to_string(),
            });
        }
        Ok(Self { steps })
    }

    /// Step size in dB applied after trial `trial_index` is scored
    pub fn step_for_trial(&self, trial_index: usize) -> u32 {
        let last = self.steps.len() - 1;
        self.steps[trial_index.min(last)]
    }

    pub fn steps(&self) -> &[u32] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; construction rejects empty schedules.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl TryFrom<Vec<u32>> for StepSchedule {
    type Error = SessionError;

    fn try_from(steps: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(steps)
    }
}

impl From<StepSchedule> for Vec<u32> {
    fn from(schedule: StepSchedule) -> Self {
        schedule.steps
    }
}
