//! Step-by-step document pipeline.
//!
//! Step *i* reads the documents written by step *i − 1* (the first step
//! reads the input folder) and writes them to `outputs/NN-<name>/`. A
//! document that fails a step is logged, counted and left out of every
//! later step. Errors outside a single document (unreadable folders,
//! change-log files) stop the run.
//!
//! Changes a step makes to a document are buffered and reach the change log
//! only once the step's output for that document has been written.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use fresh_changelog::ChangeRecorder;
use fresh_model::{Change, ChangeAction, MemorySink, document_id_from_filename};
use fresh_transform::TransformStats;
use fresh_xml::Document;
use tracing::{debug, error, info, info_span};

use crate::config::{PipelineConfig, StepKind};
use crate::context::RunContext;
use crate::steps;
use crate::types::{DocumentFailure, RunResult, StepSummary};

/// Per-step information handed to [`Step::run`].
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// `NN-name` label of the running step.
    pub task: &'a str,
}

/// One parsed document travelling through a step.
pub struct DocumentJob<'a> {
    pub file_name: &'a str,
    /// Identifier derived from the file name (prefix before the first `_`).
    pub document_id: String,
    pub document: Document,
    /// Changes made by the running step, not yet in the change log.
    pub changes: MemorySink,
    /// Documents to write in place of `document`, by file name. Empty means
    /// `document` is written under `file_name`.
    pub outputs: Vec<(String, Document)>,
}

impl<'a> DocumentJob<'a> {
    pub fn new(file_name: &'a str, document: Document) -> Self {
        Self {
            file_name,
            document_id: document_id_from_filename(Path::new(file_name)),
            document,
            changes: MemorySink::new(),
            outputs: Vec::new(),
        }
    }

    /// Buffer `change` for the document's change log and count it.
    pub fn record(&mut self, outcome: &mut StepOutcome, change: Change) {
        outcome.count(change.action);
        self.changes.changes.push(change);
    }
}

/// What one step did to one document once its output is on disk.
#[derive(Debug)]
pub struct Processed {
    pub outcome: StepOutcome,
    /// File names written to the step folder, read by the next step.
    pub written: Vec<String>,
    pub changes: Vec<Change>,
}

/// Mutations a step performed on one document (or, summed, on many).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl StepOutcome {
    pub fn from_stats(stats: &TransformStats) -> Self {
        Self {
            added: stats.added,
            updated: stats.updated,
            deleted: stats.deleted,
        }
    }

    pub fn count(&mut self, action: ChangeAction) {
        match action {
            ChangeAction::Add => self.added += 1,
            ChangeAction::Update => self.updated += 1,
            ChangeAction::Delete => self.deleted += 1,
        }
    }

    pub fn changes(&self) -> usize {
        self.added + self.updated + self.deleted
    }

    pub fn merge(&mut self, other: &StepOutcome) {
        self.added += other.added;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}

/// A pipeline stage applied to each document in turn.
pub trait Step {
    fn kind(&self) -> StepKind;

    /// Byte-level pass over the raw file before it is parsed.
    fn prepare(&self, bytes: Vec<u8>) -> Vec<u8> {
        bytes
    }

    fn run(&self, ctx: &StepContext<'_>, job: &mut DocumentJob<'_>) -> Result<StepOutcome>;
}

pub struct PlannedStep {
    pub name: String,
    pub step: Box<dyn Step>,
}

/// Ordered list of ready-to-run steps.
pub struct Pipeline {
    steps: Vec<PlannedStep>,
}

impl Pipeline {
    pub fn new(steps: Vec<PlannedStep>) -> Self {
        Self { steps }
    }

    /// Build every enabled step, loading the resources it needs.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut planned = Vec::new();
        for step_config in config.enabled_steps() {
            let step = steps::build(step_config, &config.folders)
                .with_context(|| format!("prepare step '{}'", step_config.name()))?;
            planned.push(PlannedStep {
                name: step_config.name().to_string(),
                step,
            });
        }
        Ok(Self::new(planned))
    }

    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    /// Run every step over the documents of the input folder.
    pub fn run(&self, ctx: &mut RunContext) -> Result<RunResult> {
        let input_dir = ctx.folders().input.clone();
        let mut documents = list_documents(&input_dir)?;
        let total = documents.len();
        info!(
            input = %input_dir.display(),
            documents = total,
            steps = self.steps.len(),
            run_dir = %ctx.run_dir().display(),
            "pipeline started"
        );

        let mut current_input = input_dir;
        let mut summaries = Vec::with_capacity(self.steps.len());
        let mut failures = Vec::new();
        let mut final_output = None;

        for (idx, planned) in self.steps.iter().enumerate() {
            let task = format!("{:02}-{}", idx + 1, planned.name);
            let output_dir = ctx.outputs_dir().join(&task);
            fs::create_dir_all(&output_dir)
                .with_context(|| format!("create step folder {}", output_dir.display()))?;

            let step_span = info_span!("step", task = %task, kind = %planned.step.kind());
            let _step_guard = step_span.enter();
            let started = Instant::now();
            let step_ctx = StepContext { task: &task };
            let mut summary = StepSummary::new(&task, planned.step.kind());
            let mut kept = Vec::with_capacity(documents.len());

            for file_name in documents {
                let document_span = info_span!("document", file = %file_name);
                let result = document_span.in_scope(|| {
                    process_document(
                        planned.step.as_ref(),
                        &step_ctx,
                        &current_input,
                        &output_dir,
                        &file_name,
                    )
                });
                let recorder = ctx.recorder(&file_name)?;
                match result {
                    Ok(processed) => {
                        flush_changes(recorder, &task, processed.changes)
                            .with_context(|| format!("write change log for {file_name}"))?;
                        summary.record(&processed.outcome);
                        kept.extend(processed.written);
                    }
                    Err(err) => {
                        let message = format!("{err:#}");
                        error!(file = %file_name, error = %message, "document dropped");
                        summary.failed += 1;
                        failures.push(DocumentFailure {
                            task: task.clone(),
                            file_name,
                            message,
                        });
                    }
                }
            }

            info!(
                documents = summary.documents,
                modified = summary.modified,
                failed = summary.failed,
                added = summary.totals.added,
                updated = summary.totals.updated,
                deleted = summary.totals.deleted,
                duration_ms = started.elapsed().as_millis(),
                "step complete"
            );
            documents = kept;
            current_input = output_dir.clone();
            final_output = Some(output_dir);
            summaries.push(summary);
        }

        info!(failed = failures.len(), "pipeline complete");
        Ok(RunResult {
            run_dir: ctx.run_dir().to_path_buf(),
            outputs_dir: ctx.outputs_dir().to_path_buf(),
            changelogs_dir: ctx.changelogs_dir().to_path_buf(),
            documents: total,
            steps: summaries,
            failures,
            final_output,
        })
    }
}

fn process_document(
    step: &dyn Step,
    ctx: &StepContext<'_>,
    input_dir: &Path,
    output_dir: &Path,
    file_name: &str,
) -> Result<Processed> {
    let input_path = input_dir.join(file_name);
    let bytes =
        fs::read(&input_path).with_context(|| format!("read {}", input_path.display()))?;
    let document = Document::parse(&step.prepare(bytes))
        .with_context(|| format!("parse {file_name}"))?;
    let mut job = DocumentJob::new(file_name, document);
    let outcome = step.run(ctx, &mut job)?;

    let outputs = if job.outputs.is_empty() {
        vec![(file_name.to_string(), job.document)]
    } else {
        job.outputs
    };
    let mut written = Vec::with_capacity(outputs.len());
    for (name, document) in outputs {
        let output_path = output_dir.join(&name);
        document
            .write_to_path(&output_path)
            .with_context(|| format!("write {}", output_path.display()))?;
        written.push(name);
    }
    debug!(
        document_id = %job.document_id,
        changes = outcome.changes(),
        outputs = written.len(),
        "document written"
    );
    Ok(Processed {
        outcome,
        written,
        changes: job.changes.changes,
    })
}

/// Open the task block in the change log and append the buffered changes.
fn flush_changes(recorder: &mut ChangeRecorder, task: &str, changes: Vec<Change>) -> Result<()> {
    recorder.start_task(task)?;
    for change in changes {
        recorder.log(change)?;
    }
    Ok(())
}

/// Regular `*.xml` files of `dir`, sorted by name.
pub fn list_documents(dir: &Path) -> Result<Vec<String>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("list documents in {}", dir.display()))?;
    let mut names = Vec::new();
    for entry in entries {
        let path: PathBuf = entry
            .with_context(|| format!("list documents in {}", dir.display()))?
            .path();
        let is_xml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if !path.is_file() || !is_xml {
            continue;
        }
        if let Some(name) = path.file_name() {
            names.push(name.to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
