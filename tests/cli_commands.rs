use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hint_cli"))
}

fn fixture_file(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn missing_config(dir: &Path) -> String {
    dir.join("absent.json").to_string_lossy().into_owned()
}

fn run_with_input(args: &[&str], input: &str) -> Output {
    let mut child = cli()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn hint_cli");
    child
        .stdin
        .take()
        .expect("stdin piped")
        .write_all(input.as_bytes())
        .expect("write responses");
    child.wait_with_output().expect("hint_cli finished")
}

#[test]
fn run_session_writes_records_and_reports_srt() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("run.csv");
    let config = missing_config(dir.path());
    let sentences = fixture_file("hint_sentences.csv");
    let out_arg = out.to_string_lossy().into_owned();

    // Trial answers: 99 is rejected and asked again
    let input = "99\n1\n1\n\n1\n\n\n1\n\n\n\n";
    let output = run_with_input(
        &[
            "run",
            "--config",
            &config,
            "--sentences",
            &sentences,
            "--lists",
            "1",
            "--steps",
            "4",
            "--output",
            &out_arg,
        ],
        input,
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(
        output.status.success(),
        "CLI exited with {:?}: {stdout}",
        output.status.code()
    );
    assert!(stdout.contains("there is no word 99"), "got {stdout}");
    assert!(stdout.contains("1:A 2:boy 3:fell"), "got {stdout}");
    assert!(stdout.contains("(-35.0 dB FS)"), "got {stdout}");
    assert!(
        stdout.contains("HINT score: 2.00 dB SNR (10 trials)"),
        "got {stdout}"
    );

    let contents = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 11);
    assert!(lines[0].starts_with("trial,subject,condition,list_num"));
}

#[test]
fn run_session_quit_early_reports_insufficient_data() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("short.csv");
    let config = missing_config(dir.path());
    let sentences = fixture_file("hint_sentences.csv");
    let out_arg = out.to_string_lossy().into_owned();

    let output = run_with_input(
        &[
            "run",
            "--config",
            &config,
            "--sentences",
            &sentences,
            "--output",
            &out_arg,
        ],
        "\n1\nq\n",
    );

    assert_eq!(output.status.code(), Some(3));
    let contents = fs::read_to_string(&out).unwrap();
    assert_eq!(contents.lines().count(), 3);
}

#[test]
fn run_session_rejects_empty_selection() {
    let dir = tempfile::tempdir().unwrap();
    let config = missing_config(dir.path());
    let sentences = fixture_file("hint_sentences.csv");
    let out_arg = dir.path().join("none.csv").to_string_lossy().into_owned();

    let output = run_with_input(
        &[
            "run",
            "--config",
            &config,
            "--sentences",
            &sentences,
            "--lists",
            "42",
            "--output",
            &out_arg,
        ],
        "",
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("no sentences"), "got {stderr}");
}

#[test]
fn lists_shows_sentence_counts() {
    let output = cli()
        .args(["lists", "--sentences", &fixture_file("hint_sentences.csv")])
        .output()
        .expect("failed to run lists");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert!(stdout.contains("List 1: 10 sentences"), "got {stdout}");
    assert!(stdout.contains("List 3: 3 sentences"), "got {stdout}");
}

#[test]
fn estimate_prints_threshold_json() {
    let output = cli()
        .args([
            "estimate",
            "--levels",
            "70,66,68,64,62,60,58,56",
            "--noise-level",
            "65",
        ])
        .output()
        .expect("failed to run estimate");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("estimate JSON payload");
    assert_eq!(json["threshold_db_snr"].as_f64(), Some(-6.0));
    assert_eq!(json["levels_averaged"].as_u64(), Some(4));
}

#[test]
fn estimate_with_short_history_exits_with_code_3() {
    let output = cli()
        .args(["estimate", "--levels", "65,69,65"])
        .output()
        .expect("failed to run estimate");
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("Insufficient data"), "got {stderr}");
}

#[test]
fn calibrate_reports_offset_and_level() {
    let dir = tempfile::tempdir().unwrap();
    let output = cli()
        .args([
            "calibrate",
            "--config",
            &missing_config(dir.path()),
            "--cal-level=-20",
            "--slm-reading",
            "75",
            "--desired",
            "60",
        ])
        .output()
        .expect("failed to run calibrate");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("calibration JSON payload");
    assert_eq!(json["slm_offset_db"].as_f64(), Some(95.0));
    assert_eq!(json["presentation_level_dbfs"].as_f64(), Some(-35.0));
}

#[test]
fn init_config_writes_defaults_and_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings").join("hint_config.json");
    let path_arg = path.to_string_lossy().into_owned();

    let output = cli()
        .args(["init-config", "--path", &path_arg])
        .output()
        .expect("failed to run init-config");
    assert!(output.status.success());

    let json: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["stimulus"]["step_sizes"], "4, 4, 4, 4, 2");
    assert_eq!(json["levels"]["starting_level_db"].as_f64(), Some(65.0));

    let again = cli()
        .args(["init-config", "--path", &path_arg])
        .output()
        .expect("failed to rerun init-config");
    assert_eq!(again.status.code(), Some(1));

    let forced = cli()
        .args(["init-config", "--path", &path_arg, "--force"])
        .output()
        .expect("failed to force init-config");
    assert!(forced.status.success());
}

#[test]
fn run_session_saves_to_new_path_after_failed_write() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let blocked = blocker.join("out.csv").to_string_lossy().into_owned();
    let good = dir.path().join("moved.csv");
    let config = missing_config(dir.path());
    let sentences = fixture_file("hint_sentences.csv");

    // First answer fails to save, then the operator names a new file
    let input = format!("\n{}\n\n1\n", good.display());
    let output = run_with_input(
        &[
            "run",
            "--config",
            &config,
            "--sentences",
            &sentences,
            "--lists",
            "3",
            "--output",
            &blocked,
        ],
        &input,
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    assert_eq!(output.status.code(), Some(3), "got {stdout}");
    assert!(stdout.contains("could not save trial"), "got {stdout}");
    assert!(stdout.contains("moved.csv"), "got {stdout}");

    let contents = fs::read_to_string(&good).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("1,999,test,3,1,65.0,"));
    assert!(lines[3].ends_with(",-1"));
}

#[test]
fn negative_levels_are_accepted() {
    let output = cli()
        .args([
            "estimate",
            "--levels",
            "70,66,68,64,62,60,58,56",
            "--noise-level",
            "-5",
        ])
        .output()
        .expect("failed to run estimate");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json: Value = serde_json::from_slice(&output.stdout).expect("estimate JSON payload");
    assert_eq!(json["threshold_db_snr"].as_f64(), Some(64.0));

    let dir = tempfile::tempdir().unwrap();
    let output = cli()
        .args([
            "calibrate",
            "--config",
            &missing_config(dir.path()),
            "--desired",
            "-10",
        ])
        .output()
        .expect("failed to run calibrate");
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("calibration JSON payload");
    assert_eq!(json["presentation_level_dbfs"].as_f64(), Some(-110.0));
}
