use std::path::PathBuf;

use fresh_model::Change;
use fresh_transform::TransformStats;

use crate::config::StepKind;
use crate::pipeline::StepOutcome;

#[derive(Debug)]
pub struct RunResult {
    pub run_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub changelogs_dir: PathBuf,
    /// Documents found in the input folder.
    pub documents: usize,
    pub steps: Vec<StepSummary>,
    pub failures: Vec<DocumentFailure>,
    /// Output folder of the last step, if any step ran.
    pub final_output: Option<PathBuf>,
}

impl RunResult {
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct StepSummary {
    /// `NN-name`, also the output subfolder and change-log task.
    pub task: String,
    pub kind: StepKind,
    pub documents: usize,
    /// Documents with at least one recorded change.
    pub modified: usize,
    pub failed: usize,
    pub totals: StepOutcome,
}

impl StepSummary {
    pub fn new(task: impl Into<String>, kind: StepKind) -> Self {
        Self {
            task: task.into(),
            kind,
            documents: 0,
            modified: 0,
            failed: 0,
            totals: StepOutcome::default(),
        }
    }

    pub fn record(&mut self, outcome: &StepOutcome) {
        self.documents += 1;
        if outcome.changes() > 0 {
            self.modified += 1;
        }
        self.totals.merge(outcome);
    }
}

/// A document dropped from the run.
#[derive(Debug, Clone)]
pub struct DocumentFailure {
    pub task: String,
    pub file_name: String,
    pub message: String,
}

/// Result of a single-document `transform`.
#[derive(Debug)]
pub struct TransformReport {
    pub document_id: String,
    pub table: String,
    pub output: PathBuf,
    pub stats: TransformStats,
    pub changes: Vec<Change>,
    /// Change-log folder, when one was requested.
    pub changelog_dir: Option<PathBuf>,
}
