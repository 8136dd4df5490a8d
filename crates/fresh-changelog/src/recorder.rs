//! Per-document change recorder.
//!
//! Every document gets two files in the change-log directory: `<stem>.log`,
//! a readable account grouped by task, and `<stem>.csv` with one row per
//! change. Both are append-only; the CSV header is written once, when the
//! file is first created.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use csv::WriterBuilder;
use fresh_model::{Change, ChangeAction, ChangeRecord, ChangeSink, ModelError};

use crate::error::{ChangelogError, Result};

const CSV_HEADER: [&str; 6] = [
    "timestamp",
    "task",
    "action",
    "field",
    "old_value",
    "new_value",
];

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Audit sink for one document across the whole pipeline run.
#[derive(Debug)]
pub struct ChangeRecorder {
    document: String,
    log_path: PathBuf,
    csv_path: PathBuf,
    task: String,
    records: Vec<ChangeRecord>,
}

impl ChangeRecorder {
    /// Create a recorder for `document` (a file name or path) writing into
    /// `log_dir`.
    pub fn create(document: &Path, log_dir: &Path) -> Result<Self> {
        let stem = document
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| document.to_string_lossy().into_owned());
        fs::create_dir_all(log_dir).map_err(|source| ChangelogError::Io {
            path: log_dir.to_path_buf(),
            source,
        })?;
        let recorder = Self {
            document: document
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| stem.clone()),
            log_path: log_dir.join(format!("{stem}.log")),
            csv_path: log_dir.join(format!("{stem}.csv")),
            task: String::new(),
            records: Vec::new(),
        };
        if !recorder.csv_path.exists() {
            recorder.append_csv(&CSV_HEADER)?;
        }
        Ok(recorder)
    }

    /// File name of the tracked document.
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    /// Task currently stamped onto new records.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Every change recorded so far, in order.
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Records written by `task`.
    pub fn records_for<'a>(&'a self, task: &'a str) -> impl Iterator<Item = &'a ChangeRecord> + 'a {
        self.records.iter().filter(move |record| record.task == task)
    }

    /// Start a new task block in the text log.
    pub fn start_task(&mut self, task: &str) -> Result<()> {
        self.task = task.to_string();
        self.append_log(&format!("\n==> Task: {task}\n"))
    }

    /// Record one change in both logs and in memory.
    pub fn log(&mut self, change: Change) -> Result<()> {
        let record = ChangeRecord::new(timestamp(), self.task.clone(), change);
        let message = render_message(&record);
        self.append_log(&format!("{} - {message}\n", record.timestamp))?;
        self.append_csv(&[
            record.timestamp.as_str(),
            record.task.as_str(),
            record.action.as_str(),
            record.field.as_str(),
            record.old_value.as_str(),
            record.new_value.as_str(),
        ])?;
        tracing::trace!(
            document = %self.document,
            task = %record.task,
            action = %record.action,
            field = %record.field,
            "change recorded"
        );
        self.records.push(record);
        Ok(())
    }

    fn open_append(&self, path: &Path) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| ChangelogError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    fn append_log(&self, text: &str) -> Result<()> {
        let mut file = self.open_append(&self.log_path)?;
        file.write_all(text.as_bytes())
            .map_err(|source| ChangelogError::Io {
                path: self.log_path.clone(),
                source,
            })
    }

    fn append_csv(&self, fields: &[&str]) -> Result<()> {
        let file = self.open_append(&self.csv_path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        let csv_error = |source: csv::Error| ChangelogError::Csv {
            path: self.csv_path.clone(),
            source,
        };
        writer.write_record(fields).map_err(csv_error)?;
        writer.flush().map_err(|source| ChangelogError::Io {
            path: self.csv_path.clone(),
            source,
        })
    }
}

fn render_message(record: &ChangeRecord) -> String {
    let prefix = format!("[{}] Field '{}'", record.task, record.field);
    match record.action {
        ChangeAction::Add => format!("{prefix} ADDED:\n+ {}", record.new_value),
        ChangeAction::Update => format!(
            "{prefix} UPDATED:\n- {}\n+ {}",
            record.old_value, record.new_value
        ),
        ChangeAction::Delete if record.old_value.is_empty() => format!("{prefix} DELETED"),
        ChangeAction::Delete => format!("{prefix} DELETED:\n- {}", record.old_value),
    }
}

impl ChangeSink for ChangeRecorder {
    fn record(&mut self, change: Change) -> fresh_model::Result<()> {
        self.log(change)
            .map_err(|err| ModelError::Sink(Box::new(err)))
    }
}
