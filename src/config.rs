//! Configuration management for test sessions
//!
//! `AppConfig` is the persisted settings file (JSON). Its stimulus and level
//! fields are kept in the flat, string-friendly form the operator edits;
//! `AppConfig::session_config` parses them into the immutable
//! `SessionConfig` the staircase runs on. Changing a setting mid-session
//! means building a new `SessionConfig` snapshot, never editing one in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::calibration::CalibrationOffset;
use crate::catalog::TrialOrder;
use crate::error::SessionError;
use crate::session::SessionMetadata;
use crate::staircase::StepSchedule;

/// Default location of the settings file
pub const DEFAULT_CONFIG_PATH: &str = "assets/hint_config.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub stimulus: StimulusSettings,
    #[serde(default)]
    pub levels: LevelSettings,
    #[serde(default)]
    pub calibration: CalibrationSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// Who is being tested and under which condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub subject: String,
    pub condition: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            subject: "999".to_string(),
            condition: "test".to_string(),
        }
    }
}

/// Stimulus selection and staircase schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StimulusSettings {
    /// Sentence lists, comma-separated ("1, 2")
    pub lists: String,
    /// Step sizes in dB, comma-separated ("4, 4, 4, 4, 2")
    pub step_sizes: String,
    /// Shuffle the selected sentences
    #[serde(default)]
    pub randomize: bool,
    /// Fixed shuffle seed; a fresh seed is drawn per session when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Times each selected sentence is presented
    #[serde(default = "default_repetitions")]
    pub repetitions: u32,
    /// Sentence table with list_num, sentence_num, sentence, file columns
    pub sentence_file: PathBuf,
    /// Directory the `file` column is relative to
    pub audio_dir: PathBuf,
}

fn default_repetitions() -> u32 {
    1
}

impl Default for StimulusSettings {
    fn default() -> Self {
        Self {
            lists: "1, 2".to_string(),
            step_sizes: "4, 4, 4, 4, 2".to_string(),
            randomize: false,
            seed: None,
            repetitions: default_repetitions(),
            sentence_file: PathBuf::from("stimuli/hint_sentences.csv"),
            audio_dir: PathBuf::from("stimuli/audio"),
        }
    }
}

/// Presentation levels in dB SPL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSettings {
    /// Speech level of the first trial
    pub starting_level_db: f64,
    /// Fixed noise level; the SRT is reported relative to it
    pub noise_level_db: f64,
}

impl Default for LevelSettings {
    fn default() -> Self {
        Self {
            starting_level_db: 65.0,
            noise_level_db: 65.0,
        }
    }
}

/// Sound level meter calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSettings {
    /// Digital level the calibration tone is played at (dB FS)
    pub cal_level_db: f64,
    /// Sound level meter reading of the calibration tone (dB SPL)
    pub slm_reading_db: f64,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            cal_level_db: -30.0,
            slm_reading_db: 70.0,
        }
    }
}

/// Where trial records are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Data"),
        }
    }
}

/// Typed, immutable parameters of one staircase run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub selected_lists: BTreeSet<u32>,
    pub step_sizes: StepSchedule,
    pub starting_level_db: f64,
    pub noise_level_db: f64,
}

impl SessionConfig {
    pub fn new(
        selected_lists: BTreeSet<u32>,
        step_sizes: StepSchedule,
        starting_level_db: f64,
        noise_level_db: f64,
    ) -> Self {
        Self {
            selected_lists,
            step_sizes,
            starting_level_db,
            noise_level_db,
        }
    }

    /// Snapshot with a different starting level
    pub fn with_starting_level(&self, starting_level_db: f64) -> Self {
        Self {
            starting_level_db,
            ..self.clone()
        }
    }

    /// Snapshot with a different noise level
    pub fn with_noise_level(&self, noise_level_db: f64) -> Self {
        Self {
            noise_level_db,
            ..self.clone()
        }
    }

    /// Snapshot with a different step schedule
    pub fn with_step_sizes(&self, step_sizes: StepSchedule) -> Self {
        Self {
            step_sizes,
            ..self.clone()
        }
    }

    /// Snapshot with a different list selection
    pub fn with_lists(&self, selected_lists: BTreeSet<u32>) -> Self {
        Self {
            selected_lists,
            ..self.clone()
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file doesn't exist or
    /// the JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Persist the configuration as pretty-printed JSON, creating parent
    /// directories as needed
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(path, json)?;
        log::info!("[Config] Saved configuration to {:?}", path);
        Ok(())
    }

    /// Parse the editable settings into a `SessionConfig`.
    ///
    /// # Errors
    /// `InvalidConfig` naming the first field that fails to parse.
    pub fn session_config(&self) -> Result<SessionConfig, SessionError> {
        let selected_lists: BTreeSet<u32> = parse_int_list("lists", &self.stimulus.lists)?
            .into_iter()
            .collect();
        if selected_lists.is_empty() {
            return Err(SessionError::InvalidConfig {
                field: "lists".to_string(),
                reason: "at least one list is required".to_string(),
            });
        }

        let step_sizes =
            StepSchedule::new(parse_int_list("step_sizes", &self.stimulus.step_sizes)?)?;

        for (field, value) in [
            ("starting_level_db", self.levels.starting_level_db),
            ("noise_level_db", self.levels.noise_level_db),
        ] {
            if !value.is_finite() {
                return Err(SessionError::InvalidConfig {
                    field: field.to_string(),
                    reason: format!("{} is not a finite level", value),
                });
            }
        }

        Ok(SessionConfig::new(
            selected_lists,
            step_sizes,
            self.levels.starting_level_db,
            self.levels.noise_level_db,
        ))
    }

    /// Trial ordering from the randomize/seed settings
    pub fn trial_order(&self) -> TrialOrder {
        if self.stimulus.randomize {
            TrialOrder::Shuffled {
                seed: self.stimulus.seed.unwrap_or_else(rand::random),
            }
        } else {
            TrialOrder::Sequential
        }
    }

    pub fn calibration_offset(&self) -> CalibrationOffset {
        CalibrationOffset::from_reading(
            self.calibration.slm_reading_db,
            self.calibration.cal_level_db,
        )
    }

    pub fn session_metadata(&self) -> SessionMetadata {
        SessionMetadata {
            subject: self.session.subject.clone(),
            condition: self.session.condition.clone(),
        }
    }
}

/// Parse a comma-separated list of non-negative integers ("4, 4, 2").
///
/// Whitespace around entries is ignored and empty entries are skipped.
pub fn parse_int_list(field: &str, value: &str) -> Result<Vec<u32>, SessionError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse::<u32>().map_err(|_| SessionError::InvalidConfig {
                field: field.to_string(),
                reason: format!("'{}' is not a non-negative integer", entry),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.session.subject, "999");
        assert_eq!(config.stimulus.lists, "1, 2");
        assert_eq!(config.stimulus.step_sizes, "4, 4, 4, 4, 2");
        assert_eq!(config.levels.starting_level_db, 65.0);
        assert_eq!(config.levels.noise_level_db, 65.0);
        assert_eq!(config.stimulus.repetitions, 1);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.stimulus.step_sizes, config.stimulus.step_sizes);
        assert_eq!(parsed.calibration.slm_reading_db, config.calibration.slm_reading_db);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"session": {"subject": "S01", "condition": "quiet"}}"#)
                .unwrap();
        assert_eq!(parsed.session.subject, "S01");
        assert_eq!(parsed.levels.noise_level_db, 65.0);
    }

    #[test]
    fn test_session_config_from_defaults() {
        let session = AppConfig::default().session_config().unwrap();
        assert_eq!(session.selected_lists, BTreeSet::from([1, 2]));
        assert_eq!(session.step_sizes.steps(), &[4, 4, 4, 4, 2]);
        assert_eq!(session.starting_level_db, 65.0);
    }

    #[test]
    fn test_session_config_rejects_bad_steps() {
        let mut config = AppConfig::default();
        config.stimulus.step_sizes = "4, four".to_string();
        match config.session_config() {
            Err(SessionError::InvalidConfig { field, .. }) => assert_eq!(field, "step_sizes"),
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }

        config.stimulus.step_sizes = " , ".to_string();
        assert!(matches!(
            config.session_config(),
            Err(SessionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_session_config_rejects_empty_lists() {
        let mut config = AppConfig::default();
        config.stimulus.lists = String::new();
        match config.session_config() {
            Err(SessionError::InvalidConfig { field, .. }) => assert_eq!(field, "lists"),
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_session_config_rejects_nan_level() {
        let mut config = AppConfig::default();
        config.levels.noise_level_db = f64::NAN;
        assert!(matches!(
            config.session_config(),
            Err(SessionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_parse_int_list() {
        assert_eq!(parse_int_list("x", "1, 2,3 ,  4").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(parse_int_list("x", "").unwrap(), Vec::<u32>::new());
        assert!(parse_int_list("x", "1, -2").is_err());
    }

    #[test]
    fn test_snapshots_leave_original_untouched() {
        let original = AppConfig::default().session_config().unwrap();
        let louder = original.with_starting_level(70.0);
        assert_eq!(original.starting_level_db, 65.0);
        assert_eq!(louder.starting_level_db, 70.0);
        assert_eq!(louder.step_sizes, original.step_sizes);

        let quieter_noise = original.with_noise_level(55.0);
        assert_eq!(quieter_noise.noise_level_db, 55.0);
        assert_eq!(original.noise_level_db, 65.0);
    }

    #[test]
    fn test_trial_order() {
        let mut config = AppConfig::default();
        assert_eq!(config.trial_order(), TrialOrder::Sequential);
        config.stimulus.randomize = true;
        config.stimulus.seed = Some(11);
        assert_eq!(config.trial_order(), TrialOrder::Shuffled { seed: 11 });
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config.session.subject = "S42".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path);
        assert_eq!(loaded.session.subject, "S42");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let loaded = AppConfig::load_from_file("/definitely/not/here.json");
        assert_eq!(loaded.session.subject, "999");
    }
}
