//! Trial catalog: the sentence table a session draws its trials from.
//!
//! The source is a header-row text file with at least the columns
//! `list_num`, `sentence_num`, `sentence` and `file`. Rows are kept in
//! source order; `select` filters by list number and `build_sequence`
//! applies the repetition count and optional seeded shuffle.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::BufRead;
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

pub(crate) mod parse;

/// Columns every sentence source must provide.
pub const REQUIRED_COLUMNS: [&str; 4] = ["list_num", "sentence_num", "sentence", "file"];

/// One recorded sentence. Never mutated after loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialDefinition {
    pub list_number: u32,
    pub sentence_number: u32,
    pub sentence_text: String,
    /// Audio reference, relative to the stimulus directory
    pub audio_file: String,
}

/// Ordering applied to the selected trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrialOrder {
    /// Source order
    #[default]
    Sequential,
    /// Deterministic shuffle from the given seed
    Shuffled { seed: u64 },
}

/// Number of sentences available in a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListSummary {
    pub list_number: u32,
    pub sentence_count: usize,
}

/// All trials from a sentence source, in source order
#[derive(Debug, Clone, Default)]
pub struct TrialCatalog {
    trials: Vec<TrialDefinition>,
}

struct ColumnIndex {
    list_num: usize,
    sentence_num: usize,
    sentence: usize,
    file: usize,
    width: usize,
}

impl ColumnIndex {
    fn from_header(header: &[String]) -> Result<Self, SessionError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|column| column.eq_ignore_ascii_case(name))
        };

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| find(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(SessionError::CatalogFormat {
                reason: format!("missing required columns: {}", missing.join(", ")),
            });
        }

        // The filter above guarantees every lookup succeeds.
        let index = |name: &str| find(name).unwrap_or_default();
        Ok(Self {
            list_num: index("list_num"),
            sentence_num: index("sentence_num"),
            sentence: index("sentence"),
            file: index("file"),
            width: header.len(),
        })
    }
}

impl TrialCatalog {
    pub fn new(trials: Vec<TrialDefinition>) -> Self {
        Self { trials }
    }

    /// Parse a sentence source.
    ///
    /// Blank lines are skipped. Fails with `CatalogFormat` when the header is
    /// missing a required column, a row has the wrong number of fields, or a
    /// list/sentence number is not a non-negative integer.
    pub fn load<R: BufRead>(source: R) -> Result<Self, SessionError> {
        let mut lines = source.lines().enumerate();

        let header = loop {
            match lines.next() {
                Some((idx, line)) => {
                    let line = line.map_err(|err| SessionError::CatalogFormat {
                        reason: format!("line {}: {}", idx + 1, err),
                    })?;
                    if !line.trim().is_empty() {
                        let line = line.trim_start_matches('\u{feff}');
                        break parse::split_record(line, idx + 1)?;
                    }
                }
                None => {
                    return Err(SessionError::CatalogFormat {
                        reason: "sentence source is empty".to_string(),
                    })
                }
            }
        };
        let columns = ColumnIndex::from_header(&header)?;

        let mut trials = Vec::new();
        for (idx, line) in lines {
            let line_number = idx + 1;
            let line = line.map_err(|err| SessionError::CatalogFormat {
                reason: format!("line {}: {}", line_number, err),
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let fields = parse::split_record(&line, line_number)?;
            if fields.len() != columns.width {
                return Err(SessionError::CatalogFormat {
                    reason: format!(
                        "line {}: expected {} fields, found {}",
                        line_number,
                        columns.width,
                        fields.len()
                    ),
                });
            }

            trials.push(TrialDefinition {
                list_number: parse_number(&fields[columns.list_num], "list_num", line_number)?,
                sentence_number: parse_number(
                    &fields[columns.sentence_num],
                    "sentence_num",
                    line_number,
                )?,
                sentence_text: fields[columns.sentence].clone(),
                audio_file: fields[columns.file].clone(),
            });
        }

        log::info!("[TrialCatalog] Loaded {} sentences", trials.len());
        Ok(Self { trials })
    }

    /// Load a sentence file from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| SessionError::CatalogFormat {
            reason: format!("cannot read {}: {}", path.display(), err),
        })?;
        Self::load(contents.as_bytes())
    }

    pub fn trials(&self) -> &[TrialDefinition] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Distinct list numbers with their sentence counts, ascending.
    pub fn lists(&self) -> Vec<ListSummary> {
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for trial in &self.trials {
            *counts.entry(trial.list_number).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(list_number, sentence_count)| ListSummary {
                list_number,
                sentence_count,
            })
            .collect()
    }

    /// Trials for a session: selection repeated `repetitions` times, then
    /// ordered. A repetition count of zero is treated as one.
    pub fn build_sequence(
        &self,
        selected_lists: &BTreeSet<u32>,
        order: TrialOrder,
        repetitions: u32,
    ) -> Vec<TrialDefinition> {
        let selected = select(&self.trials, selected_lists);
        let mut sequence: Vec<TrialDefinition> = (0..repetitions.max(1))
            .flat_map(|_| selected.iter().cloned())
            .collect();

        if let TrialOrder::Shuffled { seed } = order {
            let mut rng = StdRng::seed_from_u64(seed);
            sequence.shuffle(&mut rng);
        }

        log::debug!(
            "[TrialCatalog] Built sequence of {} trials from lists {:?} ({:?}, x{})",
            sequence.len(),
            selected_lists,
            order,
            repetitions.max(1)
        );
        sequence
    }
}

/// All trials whose list number is selected, in source order.
///
/// An empty result is valid here; the session rejects it before the first
/// trial.
pub fn select(
    all_trials: &[TrialDefinition],
    selected_lists: &BTreeSet<u32>,
) -> Vec<TrialDefinition> {
    all_trials
        .iter()
        .filter(|trial| selected_lists.contains(&trial.list_number))
        .cloned()
        .collect()
}

fn parse_number(value: &str, column: &str, line_number: usize) -> Result<u32, SessionError> {
    value.parse().map_err(|_| SessionError::CatalogFormat {
        reason: format!(
            "line {}: {} '{}' is not a non-negative integer",
            line_number, column, value
        ),
    })
}
