// Scoring module - turns word marks into trial outcomes and level histories
// into a threshold
//
// 1. response: all-or-nothing sentence scoring (WordResponseSet -> TrialOutcome)
// 2. threshold: trimmed-average SRT estimate from the staircase history

pub mod response;
pub mod threshold;

pub use response::{score, Outcome, TrialOutcome, WordMark, WordResponseSet};
pub use threshold::{estimate, BRACKETING_TRIALS, MIN_TRIALS_FOR_ESTIMATE};
