//! Per-run folders and change recorders.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use fresh_changelog::ChangeRecorder;

use crate::config::Folders;

/// State shared by every step of one pipeline run.
#[derive(Debug)]
pub struct RunContext {
    folders: Folders,
    run_dir: PathBuf,
    outputs_dir: PathBuf,
    changelogs_dir: PathBuf,
    recorders: BTreeMap<String, ChangeRecorder>,
}

impl RunContext {
    /// Create `<runs>/run-YYYYMMDD-HHMMSS/{outputs,changelogs}`.
    pub fn create(folders: Folders) -> Result<Self> {
        let run_name = Local::now().format("run-%Y%m%d-%H%M%S").to_string();
        let run_dir = folders.runs.join(run_name);
        Self::create_in(folders, run_dir)
    }

    /// Use an explicit run folder.
    pub fn create_in(folders: Folders, run_dir: PathBuf) -> Result<Self> {
        let outputs_dir = run_dir.join("outputs");
        let changelogs_dir = run_dir.join("changelogs");
        for dir in [&outputs_dir, &changelogs_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("create run folder {}", dir.display()))?;
        }
        Ok(Self {
            folders,
            run_dir,
            outputs_dir,
            changelogs_dir,
            recorders: BTreeMap::new(),
        })
    }

    pub fn folders(&self) -> &Folders {
        &self.folders
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    pub fn changelogs_dir(&self) -> &Path {
        &self.changelogs_dir
    }

    /// Recorder for `file_name`, created on first use.
    pub fn recorder(&mut self, file_name: &str) -> Result<&mut ChangeRecorder> {
        if !self.recorders.contains_key(file_name) {
            let recorder = ChangeRecorder::create(Path::new(file_name), &self.changelogs_dir)
                .with_context(|| format!("create change log for {file_name}"))?;
            self.recorders.insert(file_name.to_string(), recorder);
        }
        self.recorders
            .get_mut(file_name)
            .context("change recorder missing after creation")
    }

    /// Recorders created so far, keyed by file name.
    pub fn recorders(&self) -> &BTreeMap<String, ChangeRecorder> {
        &self.recorders
    }
}
