use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use hint_trainer::config::{AppConfig, DEFAULT_CONFIG_PATH};
use hint_trainer::recorder::CsvRecorder;
use hint_trainer::scoring::{self, WordMark, WordResponseSet};
use hint_trainer::session::{PresentedTrial, Session};
use hint_trainer::{logging, SessionError, TrialCatalog};
use serde::Serialize;

/// Exit code when too few trials were scored to estimate a threshold
const EXIT_INSUFFICIENT_DATA: u8 = 3;

#[derive(Parser, Debug)]
#[command(
    name = "hint_cli",
    about = "Adaptive Hearing In Noise Test driven from the terminal"
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Settings file (missing or invalid files fall back to defaults)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Sentence table overriding the configured one
    #[arg(long)]
    sentences: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> AppConfig {
        let mut config = AppConfig::load_from_file(&self.config);
        if let Some(sentences) = &self.sentences {
            config.stimulus.sentence_file = sentences.clone();
        }
        config
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an interactive session and write the trial records
    Run {
        #[command(flatten)]
        source: ConfigArgs,
        /// Lists to present, comma-separated ("1, 2")
        #[arg(long)]
        lists: Option<String>,
        /// Step sizes in dB, comma-separated ("4, 4, 4, 4, 2")
        #[arg(long)]
        steps: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        start_level: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        noise_level: Option<f64>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        condition: Option<String>,
        /// Shuffle the sentences with this seed
        #[arg(long)]
        seed: Option<u64>,
        /// Record file (defaults to a timestamped file in the data directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the lists in a sentence table
    Lists {
        #[command(flatten)]
        source: ConfigArgs,
    },
    /// Estimate the SRT from a level history
    Estimate {
        /// Presentation levels in trial order, comma-separated
        #[arg(long, allow_hyphen_values = true)]
        levels: String,
        #[arg(long, default_value_t = 65.0, allow_hyphen_values = true)]
        noise_level: f64,
    },
    /// Compute the calibration offset and a presentation level
    Calibrate {
        #[command(flatten)]
        source: ConfigArgs,
        /// Digital level of the calibration tone (dB FS)
        #[arg(long, allow_hyphen_values = true)]
        cal_level: Option<f64>,
        /// Sound level meter reading of the tone (dB SPL)
        #[arg(long, allow_hyphen_values = true)]
        slm_reading: Option<f64>,
        /// Desired speech level (dB SPL); defaults to the starting level
        #[arg(long, allow_hyphen_values = true)]
        desired: Option<f64>,
    },
    /// Write the default settings file
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.verbose {
        logging::init_with_default("hint_trainer=debug");
    } else {
        logging::init();
    }

    match cli.command {
        Commands::Run {
            source,
            lists,
            steps,
            start_level,
            noise_level,
            subject,
            condition,
            seed,
            output,
        } => {
            let mut config = source.load();
            if let Some(lists) = lists {
                config.stimulus.lists = lists;
            }
            if let Some(steps) = steps {
                config.stimulus.step_sizes = steps;
            }
            if let Some(level) = start_level {
                config.levels.starting_level_db = level;
            }
            if let Some(level) = noise_level {
                config.levels.noise_level_db = level;
            }
            if let Some(subject) = subject {
                config.session.subject = subject;
            }
            if let Some(condition) = condition {
                config.session.condition = condition;
            }
            if let Some(seed) = seed {
                config.stimulus.randomize = true;
                config.stimulus.seed = Some(seed);
            }
            run_session(&config, output)
        }
        Commands::Lists { source } => run_lists(&source.load()),
        Commands::Estimate {
            levels,
            noise_level,
        } => run_estimate(&levels, noise_level),
        Commands::Calibrate {
            source,
            cal_level,
            slm_reading,
            desired,
        } => {
            let mut config = source.load();
            if let Some(level) = cal_level {
                config.calibration.cal_level_db = level;
            }
            if let Some(reading) = slm_reading {
                config.calibration.slm_reading_db = reading;
            }
            run_calibrate(&config, desired)
        }
        Commands::InitConfig { path, force } => run_init_config(&path, force),
    }
}

fn run_session(config: &AppConfig, output: Option<PathBuf>) -> Result<ExitCode> {
    let session_config = config
        .session_config()
        .context("invalid session settings")?;
    let catalog = load_catalog(&config.stimulus.sentence_file)?;
    let trials = catalog.build_sequence(
        &session_config.selected_lists,
        config.trial_order(),
        config.stimulus.repetitions,
    );

    let metadata = config.session_metadata();
    let recorder = match output {
        Some(path) => CsvRecorder::new(path),
        None => CsvRecorder::in_directory(
            &config.storage.data_dir,
            &metadata.subject,
            &metadata.condition,
            Local::now(),
        ),
    };

    let mut session = Session::new(session_config, metadata, trials, recorder)
        .context("cannot start session")?
        .with_calibration(config.calibration_offset());

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();

    while let Some(presented) = session.next_trial()? {
        session.mark_presenting()?;
        show_trial(&mut stdout, &presented, &config.stimulus.audio_dir)?;
        session.mark_awaiting_response()?;

        let Some(responses) = read_responses(&mut input, &mut stdout, &presented)? else {
            session.cancel();
            break;
        };

        match session.submit(&responses) {
            Ok(outcome) => {
                writeln!(stdout, "  -> {:?}", outcome.outcome)?;
            }
            Err(SessionError::Recorder(err)) => {
                writeln!(stdout, "  could not save trial: {}", err)?;
                if !retry_until_saved(&mut session, &mut input, &mut stdout)? {
                    session.cancel();
                    break;
                }
            }
            Err(err) => return Err(err).context("scoring trial"),
        }
    }

    writeln!(
        stdout,
        "Trial records: {}",
        session.recorder().path().display()
    )?;

    match session.finish() {
        Ok(result) => {
            writeln!(
                stdout,
                "HINT score: {:.2} dB SNR ({} trials)",
                result.threshold_db_snr, result.trials_scored
            )?;
            Ok(ExitCode::from(0))
        }
        Err(err @ SessionError::InsufficientData { .. }) => {
            writeln!(stdout, "{}", err)?;
            Ok(ExitCode::from(EXIT_INSUFFICIENT_DATA))
        }
        Err(err) => Err(err).context("computing HINT score"),
    }
}

fn show_trial(out: &mut impl Write, presented: &PresentedTrial, audio_dir: &Path) -> Result<()> {
    let progress = &presented.progress;
    write!(
        out,
        "Trial {}/{}  list {} sentence {}  level {:.1} dB SPL",
        progress.trial_number,
        progress.total_trials,
        presented.trial.list_number,
        presented.trial.sentence_number,
        presented.level_db
    )?;
    if let Some(dbfs) = presented.presentation_level_dbfs {
        write!(out, " ({:.1} dB FS)", dbfs)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "  audio: {}",
        audio_dir.join(&presented.trial.audio_file).display()
    )?;

    let numbered: Vec<String> = presented
        .trial
        .sentence_text
        .split_whitespace()
        .enumerate()
        .map(|(i, word)| format!("{}:{}", i + 1, word))
        .collect();
    writeln!(out, "  {}", numbered.join(" "))?;
    Ok(())
}

/// Read the missed word numbers for the current sentence. `None` means the
/// operator quit or input ended.
fn read_responses(
    input: &mut impl BufRead,
    out: &mut impl Write,
    presented: &PresentedTrial,
) -> Result<Option<WordResponseSet>> {
    loop {
        write!(out, "Missed words (blank = all correct, q = quit): ")?;
        out.flush()?;

        let Some(line) = read_line(input)? else {
            return Ok(None);
        };
        if line.eq_ignore_ascii_case("q") {
            return Ok(None);
        }

        match parse_missed(&line, &presented.trial.sentence_text) {
            Ok(responses) => return Ok(Some(responses)),
            Err(reason) => writeln!(out, "  {}", reason)?,
        }
    }
}

fn parse_missed(line: &str, sentence: &str) -> std::result::Result<WordResponseSet, String> {
    let mut responses = WordResponseSet::from_sentence(sentence);
    for token in line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let number: usize = token
            .parse()
            .map_err(|_| format!("'{}' is not a word number", token))?;
        if number == 0 || !responses.mark(number - 1, WordMark::Incorrect) {
            return Err(format!("there is no word {}", number));
        }
    }
    responses.fill_unmarked(WordMark::Correct);
    Ok(responses)
}

/// Prompt until the pending trial is saved. A non-empty answer other than
/// `q` is taken as a new record file. Returns false if the operator gives up.
fn retry_until_saved(
    session: &mut Session<CsvRecorder>,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<bool> {
    loop {
        write!(
            out,
            "Press enter to retry, type a new file path to save there, q to quit: "
        )?;
        out.flush()?;
        match read_line(input)? {
            Some(line) if line.eq_ignore_ascii_case("q") => return Ok(false),
            Some(line) if !line.is_empty() => {
                session.recorder_mut().retarget(PathBuf::from(line));
            }
            Some(_) => {}
            None => return Ok(false),
        }
        match session.retry_pending() {
            Ok(_) => return Ok(true),
            Err(err) => writeln!(out, "  could not save trial: {}", err)?,
        }
    }
}

fn read_line(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    let read = input.read_line(&mut line).context("reading responses")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn load_catalog(path: &Path) -> Result<TrialCatalog> {
    TrialCatalog::from_path(path)
        .with_context(|| format!("loading sentences from {}", path.display()))
}

fn run_lists(config: &AppConfig) -> Result<ExitCode> {
    let catalog = load_catalog(&config.stimulus.sentence_file)?;
    let lists = catalog.lists();
    if lists.is_empty() {
        println!(
            "No sentences found in {}",
            config.stimulus.sentence_file.display()
        );
        return Ok(ExitCode::from(0));
    }

    for list in lists {
        println!("List {}: {} sentences", list.list_number, list.sentence_count);
    }
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct EstimatePayload {
    threshold_db_snr: f64,
    noise_level_db: f64,
    levels_total: usize,
    levels_averaged: usize,
}

fn run_estimate(levels: &str, noise_level_db: f64) -> Result<ExitCode> {
    let history = parse_levels(levels)?;
    match scoring::estimate(&history, noise_level_db) {
        Ok(threshold_db_snr) => {
            let payload = EstimatePayload {
                threshold_db_snr,
                noise_level_db,
                levels_total: history.len(),
                levels_averaged: history.len() - scoring::BRACKETING_TRIALS,
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(ExitCode::from(0))
        }
        Err(err @ SessionError::InsufficientData { .. }) => {
            eprintln!("{}", err);
            Ok(ExitCode::from(EXIT_INSUFFICIENT_DATA))
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_levels(levels: &str) -> Result<Vec<f64>> {
    levels
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<f64>()
                .with_context(|| format!("'{}' is not a level in dB", entry))
        })
        .collect()
}

#[derive(Serialize)]
struct CalibrationPayload {
    cal_level_dbfs: f64,
    slm_reading_db: f64,
    slm_offset_db: f64,
    desired_spl_db: f64,
    presentation_level_dbfs: f64,
}

fn run_calibrate(config: &AppConfig, desired: Option<f64>) -> Result<ExitCode> {
    let offset = config.calibration_offset();
    let desired_spl_db = desired.unwrap_or(config.levels.starting_level_db);
    let payload = CalibrationPayload {
        cal_level_dbfs: config.calibration.cal_level_db,
        slm_reading_db: config.calibration.slm_reading_db,
        slm_offset_db: offset.slm_offset_db,
        desired_spl_db,
        presentation_level_dbfs: offset.presentation_level_dbfs(desired_spl_db),
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(ExitCode::from(0))
}

fn run_init_config(path: &Path, force: bool) -> Result<ExitCode> {
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    AppConfig::default()
        .save_to_file(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote default settings to {}", path.display());
    Ok(ExitCode::from(0))
}
