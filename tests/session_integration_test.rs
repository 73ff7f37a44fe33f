//! Integration tests for a complete HINT session
//!
//! These tests run the whole pipeline against the fixture sentence table:
//! - catalog loading, list selection and seeded ordering
//! - staircase progression driven by scored responses
//! - CSV trial records on disk, including recovery from a failed write
//! - SRT estimation at the end of the run

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use hint_trainer::catalog::TrialOrder;
use hint_trainer::config::AppConfig;
use hint_trainer::recorder::{CsvRecorder, TRIAL_RECORD_FIELDS};
use hint_trainer::scoring::{Outcome, WordMark, WordResponseSet};
use hint_trainer::session::{Session, SessionMetadata, SessionStatus};
use hint_trainer::{SessionConfig, SessionError, StepSchedule, TrialCatalog};

fn fixture_catalog() -> TrialCatalog {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join("hint_sentences.csv");
    TrialCatalog::from_path(path).expect("fixture sentence table loads")
}

fn metadata() -> SessionMetadata {
    SessionMetadata {
        subject: "S07".to_string(),
        condition: "noise".to_string(),
    }
}

/// Mark every word correct, or miss the last word for a failed trial
fn respond(sentence: &str, outcome: Outcome) -> WordResponseSet {
    let mut responses = WordResponseSet::from_sentence(sentence);
    if outcome == Outcome::Fail {
        responses.mark(responses.len() - 1, WordMark::Incorrect);
    }
    responses.fill_unmarked(WordMark::Correct);
    responses
}

#[test]
fn test_fixture_catalog_lists() {
    let catalog = fixture_catalog();
    let lists = catalog.lists();
    assert_eq!(lists.len(), 3);
    assert_eq!(lists[0].sentence_count, 10);
    assert_eq!(lists[2].sentence_count, 3);

    // Quoted sentence with an embedded comma
    let leaking = catalog
        .trials()
        .iter()
        .find(|t| t.list_number == 2 && t.sentence_number == 10)
        .unwrap();
    assert_eq!(leaking.sentence_text, "The tub faucet was leaking, again");
}

#[test]
fn test_seeded_order_is_reproducible() {
    let catalog = fixture_catalog();
    let lists = BTreeSet::from([1, 2]);

    let first = catalog.build_sequence(&lists, TrialOrder::Shuffled { seed: 11 }, 1);
    let second = catalog.build_sequence(&lists, TrialOrder::Shuffled { seed: 11 }, 1);
    assert_eq!(first, second);
    assert_eq!(first.len(), 20);
    assert!(first.iter().all(|t| t.list_number != 3));
}

#[test]
fn test_full_session_writes_records_and_scores() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = fixture_catalog();
    let config = SessionConfig::new(
        BTreeSet::from([1]),
        StepSchedule::new(vec![4]).unwrap(),
        65.0,
        65.0,
    );
    let trials = catalog.build_sequence(&config.selected_lists, TrialOrder::Sequential, 1);
    let out = dir.path().join("Data").join("S07_noise.csv");

    let mut session = Session::new(config, metadata(), trials, CsvRecorder::new(&out)).unwrap();

    use Outcome::{Fail, Pass};
    let outcomes = [Fail, Fail, Pass, Fail, Pass, Pass, Fail, Pass, Pass, Pass];
    for outcome in outcomes {
        let presented = session.next_trial().unwrap().expect("trial available");
        session
            .submit(&respond(&presented.trial.sentence_text, outcome))
            .unwrap();
    }
    assert!(session.next_trial().unwrap().is_none());
    assert_eq!(
        session.level_history(),
        &[65.0, 69.0, 73.0, 69.0, 73.0, 69.0, 65.0, 69.0, 65.0, 61.0]
    );

    let result = session.finish().unwrap();
    assert!((result.threshold_db_snr - 2.0).abs() < 1e-9);

    let contents = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[0], TRIAL_RECORD_FIELDS.join(","));
    assert_eq!(
        lines[1],
        "1,S07,noise,1,1,65.0,A boy fell from the,window,4,-1"
    );
    assert!(lines[10].starts_with("10,S07,noise,1,10,61.0,"));
    assert!(lines[10].ends_with(",4,1"));
}

#[test]
fn test_failed_write_recovers_after_retarget() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let good = dir.path().join("good.csv");

    let catalog = fixture_catalog();
    let config = AppConfig::default().session_config().unwrap();
    let trials = catalog.build_sequence(&config.selected_lists, TrialOrder::Sequential, 1);
    let mut session = Session::new(
        config,
        metadata(),
        trials,
        CsvRecorder::new(blocker.join("out.csv")),
    )
    .unwrap();

    let presented = session.next_trial().unwrap().unwrap();
    let err = session
        .submit(&respond(&presented.trial.sentence_text, Outcome::Pass))
        .unwrap_err();
    assert!(matches!(err, SessionError::Recorder(_)));
    assert_eq!(session.status(), SessionStatus::PendingWrite);
    assert!(session.level_history().is_empty());

    session.recorder_mut().retarget(&good);
    let outcome = session.retry_pending().unwrap().unwrap();
    assert_eq!(outcome.outcome, Outcome::Pass);
    assert_eq!(session.level_history(), &[65.0]);
    assert_eq!(session.handler().current_level_db(), 61.0);

    let contents = fs::read_to_string(&good).unwrap();
    assert_eq!(contents.lines().count(), 2);
}

#[test]
fn test_cancelled_session_scores_partial_history() {
    let catalog = fixture_catalog();
    let config = AppConfig::default().session_config().unwrap();
    let trials = catalog.build_sequence(&config.selected_lists, TrialOrder::Sequential, 1);
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(
        config,
        metadata(),
        trials,
        CsvRecorder::new(dir.path().join("partial.csv")),
    )
    .unwrap();

    for _ in 0..3 {
        let presented = session.next_trial().unwrap().unwrap();
        session
            .submit(&respond(&presented.trial.sentence_text, Outcome::Pass))
            .unwrap();
    }
    session.cancel();

    assert!(session.next_trial().unwrap().is_none());
    assert!(matches!(
        session.finish(),
        Err(SessionError::InsufficientData { available: 3, .. })
    ));
}
