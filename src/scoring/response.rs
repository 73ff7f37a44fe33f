// Response scoring - all-or-nothing sentence scoring from word marks
//
// The presentation layer hands over an explicit `WordResponseSet`; the
// scorer never looks at UI state. A trial passes only when no word is
// marked incorrect.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Binary trial result fed back into the staircase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    /// Encoding used in the persisted `response` column
    pub fn as_response_code(&self) -> i8 {
        match self {
            Outcome::Pass => 1,
            Outcome::Fail => -1,
        }
    }
}

/// Mark for a single word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WordMark {
    Correct,
    Incorrect,
    #[default]
    Unmarked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WordEntry {
    text: String,
    mark: WordMark,
}

/// Per-trial mapping from word position to its text and mark.
///
/// Positions identify words, so a sentence repeating a word ("the") keeps
/// both occurrences apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordResponseSet {
    words: BTreeMap<usize, WordEntry>,
}

impl WordResponseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unmarked entry for every whitespace-separated word of `sentence`
    pub fn from_sentence(sentence: &str) -> Self {
        let words = sentence
            .split_whitespace()
            .enumerate()
            .map(|(position, text)| {
                (
                    position,
                    WordEntry {
                        text: text.to_string(),
                        mark: WordMark::Unmarked,
                    },
                )
            })
            .collect();
        Self { words }
    }

    /// Insert or replace the word at `position`
    pub fn insert(&mut self, position: usize, text: impl Into<String>, mark: WordMark) {
        self.words.insert(
            position,
            WordEntry {
                text: text.into(),
                mark,
            },
        );
    }

    /// Set the mark of an existing word. Returns false if no word sits at
    /// `position`.
    pub fn mark(&mut self, position: usize, mark: WordMark) -> bool {
        match self.words.get_mut(&position) {
            Some(entry) => {
                entry.mark = mark;
                true
            }
            None => false,
        }
    }

    /// Mark every word correct
    pub fn mark_all_correct(&mut self) {
        for entry in self.words.values_mut() {
            entry.mark = WordMark::Correct;
        }
    }

    /// Mark every word still unmarked as `mark`
    pub fn fill_unmarked(&mut self, mark: WordMark) {
        for entry in self.words.values_mut() {
            if entry.mark == WordMark::Unmarked {
                entry.mark = mark;
            }
        }
    }

    /// Words nobody has marked yet, in sentence order
    pub fn unmarked(&self) -> Vec<String> {
        self.words_with(WordMark::Unmarked)
    }

    pub fn is_complete(&self) -> bool {
        self.words.values().all(|entry| entry.mark != WordMark::Unmarked)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn words_with(&self, mark: WordMark) -> Vec<String> {
        self.words
            .values()
            .filter(|entry| entry.mark == mark)
            .map(|entry| entry.text.clone())
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(usize, S, WordMark)> for WordResponseSet {
    fn from_iter<I: IntoIterator<Item = (usize, S, WordMark)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (position, text, mark) in iter {
            set.insert(position, text, mark);
        }
        set
    }
}

/// Scored trial, persisted and fed back into the staircase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub correct_words: Vec<String>,
    pub incorrect_words: Vec<String>,
    pub outcome: Outcome,
}

/// Partition the marks and apply the all-words-correct criterion.
///
/// Unmarked words land in neither list and do not fail the trial; callers
/// are expected to resolve them first.
pub fn score(responses: &WordResponseSet) -> TrialOutcome {
    let correct_words = responses.words_with(WordMark::Correct);
    let incorrect_words = responses.words_with(WordMark::Incorrect);
    let outcome = if incorrect_words.is_empty() {
        Outcome::Pass
    } else {
        Outcome::Fail
    };

    tracing::debug!(
        "[ResponseScorer] correct={:?} incorrect={:?} outcome={:?}",
        correct_words,
        incorrect_words,
        outcome
    );

    TrialOutcome {
        correct_words,
        incorrect_words,
        outcome,
    }
}
