use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::catalog::parse::escape_field;
use crate::error::{log_recorder_error, RecorderError};
use crate::recorder::{RecordFields, SessionRecorder};

/// `{subject}_{condition}_{YYYY_Mon_DD_HHMM}_.csv`
pub fn default_filename(subject: &str, condition: &str, started: DateTime<Local>) -> String {
    let datestamp = started.format("%Y_%b_%d_%H%M");
    format!("{}_{}_{}_.csv", subject, condition, datestamp)
}

/// Appends trial rows to a comma-separated file.
///
/// Each row is rendered in full before a single append. If the append fails
/// part way, the file is truncated back to its previous length, so a retry
/// never lands behind a partial row and earlier rows are never rewritten.
#[derive(Debug)]
pub struct CsvRecorder {
    path: PathBuf,
}

impl CsvRecorder {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Recorder for `data_dir/<default filename>`
    pub fn in_directory<P: AsRef<Path>>(
        data_dir: P,
        subject: &str,
        condition: &str,
        started: DateTime<Local>,
    ) -> Self {
        Self::new(
            data_dir
                .as_ref()
                .join(default_filename(subject, condition, started)),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point subsequent writes at a different file, e.g. after the operator
    /// picks a new location following a failed write.
    pub fn retarget<P: Into<PathBuf>>(&mut self, path: P) {
        self.path = path.into();
        log::info!("[CsvRecorder] Writing to {}", self.path.display());
    }

    fn render_row<'a, I>(values: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut line = values
            .into_iter()
            .map(escape_field)
            .collect::<Vec<_>>()
            .join(",");
        line.push('\n');
        line
    }

    fn write(&self, record: &RecordFields, ordered_fields: &[&str]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut payload = String::new();
        if needs_header {
            payload.push_str(&Self::render_row(ordered_fields.iter().copied()));
        }
        payload.push_str(&Self::render_row(
            ordered_fields
                .iter()
                .map(|field| record.get(*field).map(String::as_str).unwrap_or("")),
        ));

        append_or_rollback(&mut file, payload.as_bytes())
    }
}

/// File that can be cut back to an earlier length
trait Truncate: Write {
    fn current_len(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn current_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write `payload` in full or restore the previous length.
///
/// Returns the write error even when the rollback itself fails; the rollback
/// failure is only logged.
fn append_or_rollback<T: Truncate>(target: &mut T, payload: &[u8]) -> io::Result<()> {
    let original_len = target.current_len()?;
    let written = target.write_all(payload).and_then(|()| target.flush());

    if let Err(err) = written {
        if let Err(rollback) = target.truncate_to(original_len) {
            log::warn!(
                "[CsvRecorder] Could not roll back partial row to {} bytes: {}",
                original_len,
                rollback
            );
        }
        return Err(err);
    }
    Ok(())
}

impl SessionRecorder for CsvRecorder {
    fn append(
        &mut self,
        record: &RecordFields,
        ordered_fields: &[&str],
    ) -> Result<(), RecorderError> {
        self.write(record, ordered_fields).map_err(|err| {
            let err = RecorderError::from_io(&self.path, &err);
            log_recorder_error(&err, "append");
            err
        })
    }
}
