// Staircase module - adaptive level control for the HINT
//
// This module provides two components:
// 1. StepSchedule: decreasing step sizes, last value repeating
// 2. AdaptiveTrialHandler: the trial-by-trial state machine
//
// The staircase workflow:
// 1. Create AdaptiveTrialHandler from the trial sequence and SessionConfig
// 2. Present current_trial() at current_level_db()
// 3. advance(outcome) after each scored trial until current_trial() reports
//    OutOfTrials

mod handler;
pub mod schedule;

pub use handler::{AdaptiveTrialHandler, HandlerPhase, StaircaseState, StepReport, TrialProgress};
pub use schedule::StepSchedule;
