use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::Table;
use tracing::{info, info_span, warn};

use fresh_changelog::ChangeRecorder;
use fresh_cli::config::{Folders, PipelineConfig, StepConfig, StepKind};
use fresh_cli::context::RunContext;
use fresh_cli::pipeline::Pipeline;
use fresh_cli::types::{RunResult, TransformReport};
use fresh_model::{MemorySink, document_id_from_filename};
use fresh_transform::{RuleSet, Transformer};
use fresh_xml::Document;

use crate::cli::{CheckArgs, RuleFolderArgs, RunArgs, TransformArgs};
use crate::summary::{apply_table_style, print_rule_sets};

/// Task label used in change logs written by `transform`.
const TRANSFORM_TASK: &str = "transform";

pub fn run_pipeline(config_path: &Path, args: &RunArgs) -> Result<RunResult> {
    let mut config = PipelineConfig::load(config_path)?;
    if let Some(input) = &args.input {
        config.folders.input = input.clone();
    }
    if let Some(runs) = &args.runs_dir {
        config.folders.runs = runs.clone();
    }
    let pipeline = Pipeline::from_config(&config)?;
    if pipeline.steps().is_empty() {
        warn!(config = %config_path.display(), "no enabled steps");
    }
    let mut ctx = RunContext::create(config.folders.clone())?;
    pipeline.run(&mut ctx)
}

pub fn run_transform(config_path: &Path, args: &TransformArgs) -> Result<TransformReport> {
    let folders = resolve_folders(config_path, &args.folders)?;
    let rules = RuleSet::load(&folders.tables, &folders.specs, &args.table)
        .with_context(|| format!("load rules for {}", args.table))?;
    let bytes = fs::read(&args.document)
        .with_context(|| format!("read {}", args.document.display()))?;
    let mut document = Document::parse(&bytes)
        .with_context(|| format!("parse {}", args.document.display()))?;
    let document_id = document_id_from_filename(&args.document);

    let span = info_span!("document", file = %args.document.display(), document_id = %document_id);
    let _guard = span.enter();
    let mut sink = MemorySink::new();
    let stats = Transformer::new(&rules).apply(&mut document, &document_id, &mut sink)?;
    document
        .write_to_path(&args.output)
        .with_context(|| format!("write {}", args.output.display()))?;
    if let Some(dir) = &args.changelog_dir {
        let mut recorder = ChangeRecorder::create(&args.document, dir)?;
        recorder.start_task(TRANSFORM_TASK)?;
        for change in &sink.changes {
            recorder.log(change.clone())?;
        }
    }
    info!(
        applied = stats.applied,
        skipped = stats.skipped,
        output = %args.output.display(),
        "document transformed"
    );
    Ok(TransformReport {
        document_id,
        table: args.table.clone(),
        output: args.output.clone(),
        stats,
        changes: sink.changes,
        changelog_dir: args.changelog_dir.clone(),
    })
}

pub fn run_check(config_path: &Path, args: &CheckArgs) -> Result<()> {
    let folders = resolve_folders(config_path, &args.folders)?;
    let tables = if args.tables.is_empty() {
        configured_tables(config_path)?
    } else {
        args.tables.clone()
    };
    if tables.is_empty() {
        bail!("no tables given and none configured in {}", config_path.display());
    }
    let mut rule_sets = Vec::with_capacity(tables.len());
    for table in &tables {
        let rules = RuleSet::load(&folders.tables, &folders.specs, table)
            .with_context(|| format!("load rules for {table}"))?;
        rule_sets.push(rules);
    }
    print_rule_sets(&rule_sets);
    Ok(())
}

pub fn run_steps(config_path: &Path) -> Result<()> {
    let config = PipelineConfig::load(config_path)?;
    let mut table = Table::new();
    table.set_header(vec!["#", "Name", "Kind", "Enabled", "Parameters"]);
    apply_table_style(&mut table);
    let mut number = 0;
    for step in &config.steps {
        let label = if step.enabled {
            number += 1;
            format!("{number:02}")
        } else {
            "-".to_string()
        };
        table.add_row(vec![
            label,
            step.name().to_string(),
            step.kind.to_string(),
            if step.enabled { "yes" } else { "no" }.to_string(),
            step_parameters(step),
        ]);
    }
    println!("Config: {}", config_path.display());
    println!("Input: {}", config.folders.input.display());
    println!("{table}");
    Ok(())
}

fn step_parameters(step: &StepConfig) -> String {
    match step.kind {
        StepKind::Rules => step.tables.join(", "),
        StepKind::VocabularyUri => format!(
            "{} ({})",
            step.vocabulary.as_deref().unwrap_or_default(),
            step.fields
                .iter()
                .map(|(tag, column)| format!("{tag}={column}"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        StepKind::AddConstant => step
            .constants
            .iter()
            .map(|constant| format!("{}={}", constant.tag, constant.value))
            .collect::<Vec<_>>()
            .join(", "),
        StepKind::AddParentCategory => step.tags.join(", "),
        StepKind::CodeUri => format!(
            "{} via {}",
            step.tags.join(", "),
            step.service
                .as_ref()
                .map(|service| service.lookup_url.as_str())
                .unwrap_or_default()
        ),
        StepKind::SplitLanguages => step.languages().join(", "),
        StepKind::CorrectSpecialCharacters | StepKind::RemoveDuplicateEmpty => String::new(),
    }
}

/// Folders from the config file when it exists, overridden by flags.
fn resolve_folders(config_path: &Path, overrides: &RuleFolderArgs) -> Result<Folders> {
    let mut folders = if config_path.is_file() {
        PipelineConfig::load(config_path)?.folders
    } else {
        Folders::default()
    };
    if let Some(dir) = &overrides.tables_dir {
        folders.tables = dir.clone();
    }
    if let Some(dir) = &overrides.specs_dir {
        folders.specs = dir.clone();
    }
    Ok(folders)
}

fn configured_tables(config_path: &Path) -> Result<Vec<String>> {
    if !config_path.is_file() {
        return Ok(Vec::new());
    }
    let config = PipelineConfig::load(config_path)?;
    Ok(config
        .enabled_steps()
        .filter(|step| step.kind == StepKind::Rules)
        .flat_map(|step| step.tables.iter().cloned())
        .collect())
}
