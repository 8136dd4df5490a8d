//! Integration tests for the change recorder.

use std::fs;

use fresh_changelog::ChangeRecorder;
use fresh_model::{Change, ChangeAction, ChangeSink};

#[test]
fn test_writes_log_and_csv() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder =
        ChangeRecorder::create(std::path::Path::new("123_study.xml"), dir.path()).unwrap();
    recorder.start_task("01-update_titles").unwrap();
    recorder
        .record(Change::update("//Title", "Legacy", "Fresh"))
        .unwrap();
    recorder.record(Change::add("//fresh:Nation", "France")).unwrap();

    let log = fs::read_to_string(dir.path().join("123_study.log")).unwrap();
    assert!(log.starts_with("\n==> Task: 01-update_titles\n"));
    assert!(log.contains(" - [01-update_titles] Field '//Title' UPDATED:\n- Legacy\n+ Fresh\n"));
    assert!(log.contains("ADDED:\n+ France\n"));

    let mut reader = csv::Reader::from_path(dir.path().join("123_study.csv")).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(
        headers,
        ["timestamp", "task", "action", "field", "old_value", "new_value"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][1], "01-update_titles");
    assert_eq!(&rows[0][2], "update");
    assert_eq!(&rows[0][4], "Legacy");
    assert_eq!(&rows[1][5], "France");
}

#[test]
fn test_header_written_once_across_recorders() {
    let dir = tempfile::tempdir().unwrap();
    let doc = std::path::Path::new("9_a.xml");
    let mut first = ChangeRecorder::create(doc, dir.path()).unwrap();
    first.record(Change::delete("//X", "old")).unwrap();
    let mut second = ChangeRecorder::create(doc, dir.path()).unwrap();
    second.record(Change::delete("//Y", "")).unwrap();

    let text = fs::read_to_string(dir.path().join("9_a.csv")).unwrap();
    assert_eq!(text.matches("timestamp,task").count(), 1);
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn test_records_are_kept_in_memory_per_task() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder =
        ChangeRecorder::create(std::path::Path::new("1_doc.xml"), dir.path()).unwrap();
    recorder.start_task("01-a").unwrap();
    recorder.record(Change::add("//A", "x")).unwrap();
    recorder.start_task("02-b").unwrap();
    recorder.record(Change::update("//B", "y", "z")).unwrap();
    recorder.record(Change::delete("//C", "w")).unwrap();

    assert_eq!(recorder.records().len(), 3);
    assert_eq!(recorder.records_for("02-b").count(), 2);
    assert_eq!(recorder.records()[0].action, ChangeAction::Add);
    assert_eq!(recorder.document(), "1_doc.xml");
}

#[test]
fn test_values_with_commas_and_newlines_are_quoted() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder =
        ChangeRecorder::create(std::path::Path::new("2_doc.xml"), dir.path()).unwrap();
    recorder
        .record(Change::update("//Summary", "a, b", "line one\nline two"))
        .unwrap();

    let mut reader = csv::Reader::from_path(recorder.csv_path()).unwrap();
    let row = reader.records().next().unwrap().unwrap();
    assert_eq!(&row[4], "a, b");
    assert_eq!(&row[5], "line one\nline two");
}
