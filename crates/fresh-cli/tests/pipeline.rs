//! Integration tests for the pipeline runner and its steps.

use std::fs;
use std::path::{Path, PathBuf};

use fresh_cli::config::{Folders, PipelineConfig, StepKind};
use fresh_cli::context::RunContext;
use fresh_cli::pipeline::{Pipeline, list_documents};
use fresh_model::ChangeAction;

const STUDY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Study>
  <Title>Legacy</Title>
  <Notes>R&D costs</Notes>
  <TranchesAgeFR>
    <value>Nourrisson</value>
  </TranchesAgeFR>
  <DomainesDePathologiesFR>
    <value>Cancer: sein</value>
  </DomainesDePathologiesFR>
  <Keywords>
    <value>cohort</value>
    <value>cohort</value>
  </Keywords>
  <Empty></Empty>
</Study>
"#;

const TITLES_CSV: &str = "PEF_ID,old_label,new_label\n123,Legacy,Fresh\n";

const TITLES_SPEC: &str = r#"{
  "mode": "by_id",
  "file_id_column": "PEF_ID",
  "operations": [
    {"type": "update", "from": {"col": "old_label"}, "to": {"col": "new_label", "xpath": "Title"}}
  ]
}"#;

const AGES_CSV: &str = "URI_MeSH,label_fr,label_en\n\
    http://id.nlm.nih.gov/mesh/D007223,Nourrisson,Infant\n";

const PIPELINE: &str = r#"
[[steps]]
kind = "correct_special_characters"

[[steps]]
name = "update_titles"
kind = "rules"
tables = ["titles.csv"]

[[steps]]
kind = "split_languages"
enabled = false

[[steps]]
name = "add_ages"
kind = "vocabulary_uri"
vocabulary = "ages.csv"
fields = { TranchesAgeFR = "label_fr" }

[[steps]]
kind = "add_parent_category"
tags = ["DomainesDePathologiesFR"]

[[steps]]
kind = "add_constant"
constants = [{ tag = "ResearchTypeEN", value = "Observational Study" }]

[[steps]]
kind = "remove_duplicate_empty"
"#;

struct Workspace {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        for sub in ["input", "tables", "specs", "vocabularies"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(root.join("input/123_study.xml"), STUDY).unwrap();
        fs::write(root.join("input/456_broken.xml"), "<Study><Title>Open</Study>").unwrap();
        fs::write(root.join("input/readme.txt"), "not a document").unwrap();
        fs::write(root.join("tables/titles.csv"), TITLES_CSV).unwrap();
        fs::write(root.join("specs/titles.json"), TITLES_SPEC).unwrap();
        fs::write(root.join("vocabularies/ages.csv"), AGES_CSV).unwrap();
        Self { _dir: dir, root }
    }

    fn folders(&self) -> Folders {
        Folders {
            input: self.root.join("input"),
            runs: self.root.join("runs"),
            tables: self.root.join("tables"),
            specs: self.root.join("specs"),
            vocabularies: self.root.join("vocabularies"),
        }
    }

    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::parse(PIPELINE).unwrap();
        config.folders = self.folders();
        config
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_list_documents_filters_and_sorts() {
    let ws = Workspace::new();
    let names = list_documents(&ws.root.join("input")).unwrap();
    assert_eq!(names, vec!["123_study.xml", "456_broken.xml"]);
}

#[test]
fn test_config_file_folders_resolve_next_to_file() {
    let ws = Workspace::new();
    let config_path = ws.root.join("configs/pipeline.toml");
    fs::create_dir_all(config_path.parent().unwrap()).unwrap();
    fs::write(&config_path, "[folders]\ninput = \"../input\"\n").unwrap();

    let config = PipelineConfig::load(&config_path).unwrap();
    assert_eq!(config.folders.input, ws.root.join("configs/../input"));
    assert_eq!(config.folders.runs, ws.root.join("configs/runs"));
    assert!(config.steps.is_empty());
}

#[test]
fn test_pipeline_runs_every_enabled_step() {
    let ws = Workspace::new();
    let config = ws.config();
    let pipeline = Pipeline::from_config(&config).unwrap();
    assert_eq!(pipeline.steps().len(), 6);

    let mut ctx = RunContext::create_in(ws.folders(), ws.root.join("runs/run-test")).unwrap();
    let result = pipeline.run(&mut ctx).unwrap();

    let tasks: Vec<&str> = result.steps.iter().map(|step| step.task.as_str()).collect();
    assert_eq!(
        tasks,
        vec![
            "01-correct_special_characters",
            "02-update_titles",
            "03-add_ages",
            "04-add_parent_category",
            "05-add_constant",
            "06-remove_duplicate_empty",
        ]
    );
    assert_eq!(result.documents, 2);

    // The malformed document is dropped by the first step and never seen again.
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].file_name, "456_broken.xml");
    assert_eq!(result.failures[0].task, "01-correct_special_characters");
    assert!(result.has_errors());
    assert_eq!(result.steps[0].failed, 1);
    assert!(result.steps[1..].iter().all(|step| step.documents == 1));
    assert!(!result.outputs_dir.join("06-remove_duplicate_empty/456_broken.xml").exists());

    let rules = &result.steps[1];
    assert_eq!(rules.kind, StepKind::Rules);
    assert_eq!(rules.totals.updated, 1);
    assert_eq!(rules.modified, 1);
    assert_eq!(result.steps[5].totals.deleted, 1);

    let final_output = result.final_output.clone().unwrap();
    assert_eq!(final_output, result.outputs_dir.join("06-remove_duplicate_empty"));
    insta::assert_snapshot!(read(&final_output.join("123_study.xml")), @r#"
    <?xml version="1.0" encoding="UTF-8"?>
    <Study xmlns:fresh="urn:fresh-enrichment:v1">
      <Title>Fresh</Title>
      <Notes>R&amp;D costs</Notes>
      <TranchesAgeFR>
        <value uri="http://id.nlm.nih.gov/mesh/D007223" vocab="MeSH">Nourrisson</value>
      </TranchesAgeFR>
      <DomainesDePathologiesFR>
        <value>Cancer: sein</value>
        <value>Cancer</value>
      </DomainesDePathologiesFR>
      <Keywords>
        <value>cohort</value>
      </Keywords>
      <fresh:ResearchTypeEN>Observational Study</fresh:ResearchTypeEN>
    </Study>
    "#);
}

#[test]
fn test_pipeline_writes_change_logs_per_document() {
    let ws = Workspace::new();
    let pipeline = Pipeline::from_config(&ws.config()).unwrap();
    let mut ctx = RunContext::create_in(ws.folders(), ws.root.join("runs/run-test")).unwrap();
    pipeline.run(&mut ctx).unwrap();

    let recorder = &ctx.recorders()["123_study.xml"];
    let actions: Vec<(&str, ChangeAction, &str)> = recorder
        .records()
        .iter()
        .map(|record| (record.task.as_str(), record.action, record.field.as_str()))
        .collect();
    assert_eq!(
        actions,
        vec![
            ("02-update_titles", ChangeAction::Update, "//Title"),
            ("03-add_ages", ChangeAction::Add, "TranchesAgeFR"),
            ("04-add_parent_category", ChangeAction::Add, "DomainesDePathologiesFR"),
            ("05-add_constant", ChangeAction::Add, "fresh:ResearchTypeEN"),
            ("06-remove_duplicate_empty", ChangeAction::Delete, "value"),
        ]
    );

    let log = read(&ctx.changelogs_dir().join("123_study.log"));
    assert!(log.contains("==> Task: 01-correct_special_characters"));
    assert!(log.contains("==> Task: 06-remove_duplicate_empty"));
    assert!(log.contains("[02-update_titles] Field '//Title' UPDATED:\n- Legacy\n+ Fresh"));

    let csv = read(&ctx.changelogs_dir().join("123_study.csv"));
    assert!(csv.starts_with("timestamp,task,action,field,old_value,new_value\n"));
    assert_eq!(csv.lines().count(), 6);

    // The dropped document still has its (empty) change log.
    let broken = read(&ctx.changelogs_dir().join("456_broken.csv"));
    assert_eq!(broken.lines().count(), 1);
}

#[test]
fn test_pipeline_rerun_on_its_output_changes_nothing() {
    let ws = Workspace::new();
    let pipeline = Pipeline::from_config(&ws.config()).unwrap();
    let mut first = RunContext::create_in(ws.folders(), ws.root.join("runs/run-first")).unwrap();
    let result = pipeline.run(&mut first).unwrap();
    let final_output = result.final_output.unwrap();

    let folders = Folders {
        input: final_output.clone(),
        ..ws.folders()
    };
    let mut second = RunContext::create_in(folders, ws.root.join("runs/run-second")).unwrap();
    let rerun = pipeline.run(&mut second).unwrap();

    assert!(!rerun.has_errors());
    assert!(rerun.steps.iter().all(|step| step.modified == 0));
    assert!(second.recorders()["123_study.xml"].records().is_empty());
    assert_eq!(
        read(&final_output.join("123_study.xml")),
        read(&rerun.final_output.unwrap().join("123_study.xml"))
    );
}

#[test]
fn test_unknown_vocabulary_label_drops_document() {
    let ws = Workspace::new();
    fs::write(
        ws.root.join("vocabularies/ages.csv"),
        "URI_MeSH,label_fr,label_en\nhttp://example.org/adult,Adulte,Adult\n",
    )
    .unwrap();
    let pipeline = Pipeline::from_config(&ws.config()).unwrap();
    let mut ctx = RunContext::create_in(ws.folders(), ws.root.join("runs/run-test")).unwrap();
    let result = pipeline.run(&mut ctx).unwrap();

    let failure = result
        .failures
        .iter()
        .find(|failure| failure.file_name == "123_study.xml")
        .unwrap();
    assert_eq!(failure.task, "03-add_ages");
    assert!(failure.message.contains("Nourrisson"));
    assert_eq!(result.steps[3].documents, 0);
}

#[test]
fn test_failed_document_keeps_no_records_from_failing_step() {
    let ws = Workspace::new();
    let study = STUDY.replace(
        "<value>Nourrisson</value>",
        "<value>Nourrisson</value>\n    <value>Inconnu</value>",
    );
    fs::write(ws.root.join("input/123_study.xml"), study).unwrap();
    let pipeline = Pipeline::from_config(&ws.config()).unwrap();
    let mut ctx = RunContext::create_in(ws.folders(), ws.root.join("runs/run-test")).unwrap();
    let result = pipeline.run(&mut ctx).unwrap();

    let failure = result
        .failures
        .iter()
        .find(|failure| failure.file_name == "123_study.xml")
        .unwrap();
    assert_eq!(failure.task, "03-add_ages");
    assert!(failure.message.contains("Inconnu"));
    assert!(!result.outputs_dir.join("03-add_ages/123_study.xml").exists());

    // Nourrisson was tagged before Inconnu failed; that edit never reached
    // an output, so it must not reach the change log either.
    let recorder = &ctx.recorders()["123_study.xml"];
    let tasks: Vec<&str> = recorder.records().iter().map(|record| record.task.as_str()).collect();
    assert_eq!(tasks, vec!["02-update_titles"]);
    let csv = read(&ctx.changelogs_dir().join("123_study.csv"));
    assert_eq!(csv.lines().count(), 2);
    assert!(!csv.contains("03-add_ages"));
    let log = read(&ctx.changelogs_dir().join("123_study.log"));
    assert!(!log.contains("03-add_ages"));
}

#[test]
fn test_split_languages_feeds_each_language_forward() {
    let ws = Workspace::new();
    let mut config = PipelineConfig::parse(
        r#"
        [[steps]]
        kind = "correct_special_characters"

        [[steps]]
        kind = "split_languages"

        [[steps]]
        kind = "add_constant"
        constants = [{ tag = "ResearchTypeEN", value = "Observational Study" }]
        "#,
    )
    .unwrap();
    config.folders = ws.folders();
    let pipeline = Pipeline::from_config(&config).unwrap();
    let mut ctx = RunContext::create_in(ws.folders(), ws.root.join("runs/run-test")).unwrap();
    let result = pipeline.run(&mut ctx).unwrap();

    assert_eq!(result.steps[1].kind, StepKind::SplitLanguages);
    assert_eq!(result.steps[1].documents, 1);
    assert_eq!(result.steps[2].documents, 2);
    let final_output = result.final_output.clone().unwrap();
    assert_eq!(
        list_documents(&final_output).unwrap(),
        vec!["123-en.xml", "123-fr.xml"]
    );

    let french = read(&final_output.join("123-fr.xml"));
    assert!(french.contains("<TranchesAgeFR>"));
    let english = read(&final_output.join("123-en.xml"));
    assert!(!english.contains("<TranchesAgeFR>"));
    assert!(!english.contains("<DomainesDePathologiesFR>"));
    assert!(english.contains("<fresh:ResearchTypeEN>Observational Study</fresh:ResearchTypeEN>"));

    // Each language output keeps its own change log from then on.
    assert_eq!(ctx.recorders()["123-en.xml"].records().len(), 1);
    assert_eq!(ctx.recorders()["123-fr.xml"].records().len(), 1);
    assert!(ctx.recorders()["123_study.xml"].records().is_empty());
}

#[test]
fn test_missing_table_stops_before_running() {
    let ws = Workspace::new();
    fs::remove_file(ws.root.join("tables/titles.csv")).unwrap();
    let err = Pipeline::from_config(&ws.config()).err().unwrap();
    assert!(format!("{err:#}").contains("update_titles"));
}
