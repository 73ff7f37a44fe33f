//! Trial recording: one structured row per scored trial.
//!
//! `SessionRecorder` is the seam between the session and durable storage.
//! `CsvRecorder` appends rows to a file; `MemoryRecorder` keeps them in
//! memory for tests and dry runs.

use std::collections::HashMap;

use serde::Serialize;

use crate::catalog::TrialDefinition;
use crate::error::RecorderError;
use crate::scoring::TrialOutcome;

mod csv;

pub use csv::{default_filename, CsvRecorder};

/// Field order of the persisted trial record. Downstream tooling relies on
/// this exact order.
pub const TRIAL_RECORD_FIELDS: [&str; 10] = [
    "trial",
    "subject",
    "condition",
    "list_num",
    "sentence_num",
    "desired_level_dB",
    "correct",
    "incorrect",
    "step_size",
    "response",
];

/// Named field values for one row
pub type RecordFields = HashMap<String, String>;

/// Destination for scored trial records.
pub trait SessionRecorder {
    /// Append one row with the values of `ordered_fields`, in that order.
    ///
    /// The first write to a destination also writes the header row. A failed
    /// append must leave previously written rows intact.
    fn append(
        &mut self,
        record: &RecordFields,
        ordered_fields: &[&str],
    ) -> Result<(), RecorderError>;
}

impl<R: SessionRecorder + ?Sized> SessionRecorder for Box<R> {
    fn append(
        &mut self,
        record: &RecordFields,
        ordered_fields: &[&str],
    ) -> Result<(), RecorderError> {
        (**self).append(record, ordered_fields)
    }
}

/// Everything persisted about one scored trial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    /// 1-based trial number
    pub trial: usize,
    pub subject: String,
    pub condition: String,
    pub list_num: u32,
    pub sentence_num: u32,
    /// Level the sentence was presented at
    pub desired_level_db: f64,
    pub correct: Vec<String>,
    pub incorrect: Vec<String>,
    /// Step applied after this trial
    pub step_size: u32,
    /// 1 for pass, -1 for fail
    pub response: i8,
}

impl TrialRecord {
    pub fn new(
        trial_index: usize,
        metadata: &crate::session::SessionMetadata,
        trial: &TrialDefinition,
        level_db: f64,
        step_size: u32,
        outcome: &TrialOutcome,
    ) -> Self {
        Self {
            trial: trial_index + 1,
            subject: metadata.subject.clone(),
            condition: metadata.condition.clone(),
            list_num: trial.list_number,
            sentence_num: trial.sentence_number,
            desired_level_db: level_db,
            correct: outcome.correct_words.clone(),
            incorrect: outcome.incorrect_words.clone(),
            step_size,
            response: outcome.outcome.as_response_code(),
        }
    }

    /// Field map keyed by the names in `TRIAL_RECORD_FIELDS`
    pub fn to_fields(&self) -> RecordFields {
        [
            ("trial", self.trial.to_string()),
            ("subject", self.subject.clone()),
            ("condition", self.condition.clone()),
            ("list_num", self.list_num.to_string()),
            ("sentence_num", self.sentence_num.to_string()),
            ("desired_level_dB", format!("{:.1}", self.desired_level_db)),
            ("correct", self.correct.join(" ")),
            ("incorrect", self.incorrect.join(" ")),
            ("step_size", self.step_size.to_string()),
            ("response", self.response.to_string()),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}

/// In-memory recorder
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    header: Option<Vec<String>>,
    rows: Vec<Vec<String>>,
    fail_next: Option<RecorderError>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Make the next append fail with `err` without storing anything
    pub fn fail_next_append(&mut self, err: RecorderError) {
        self.fail_next = Some(err);
    }
}

impl SessionRecorder for MemoryRecorder {
    fn append(
        &mut self,
        record: &RecordFields,
        ordered_fields: &[&str],
    ) -> Result<(), RecorderError> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        if self.header.is_none() {
            self.header = Some(ordered_fields.iter().map(|f| f.to_string()).collect());
        }
        self.rows.push(
            ordered_fields
                .iter()
                .map(|field| record.get(*field).cloned().unwrap_or_default())
                .collect(),
        );
        Ok(())
    }
}
