//! Integration tests for the transformation engine.

use fresh_model::{ChangeAction, FRESH_NS, MemorySink, OperationSpec, RESET_SENTINEL};
use fresh_transform::{CorrespondenceTable, RuleSet, TransformStats, Transformer};
use fresh_xml::Document;

fn rules(csv: &str, spec: &str) -> RuleSet {
    let table = CorrespondenceTable::from_reader("table.csv", csv.as_bytes()).unwrap();
    let spec = OperationSpec::from_json(spec).unwrap();
    RuleSet::new(table, spec).unwrap()
}

fn run(rules: &RuleSet, xml: &str, id: &str) -> (Document, MemorySink, TransformStats) {
    let mut doc = Document::parse_str(xml).unwrap();
    let mut sink = MemorySink::new();
    let stats = Transformer::new(rules).apply(&mut doc, id, &mut sink).unwrap();
    (doc, sink, stats)
}

fn texts(doc: &Document, query: &str) -> Vec<String> {
    doc.select(query)
        .unwrap()
        .into_iter()
        .map(|id| doc.text(id))
        .collect()
}

const UPDATE_SPEC: &str = r#"{
  "mode": "by_id",
  "file_id_column": "id",
  "operations": [
    {"type": "update",
     "from": {"col": "old_label"},
     "to": {"col": "new_label", "xpath": "Title"}}
  ]
}"#;

#[test]
fn test_update_replaces_matching_text() {
    let rules = rules("id,old_label,new_label\n123,Legacy,Fresh\n", UPDATE_SPEC);
    let (doc, sink, stats) = run(&rules, "<Study><Title>Legacy</Title></Study>", "123");

    assert_eq!(texts(&doc, "//Title"), vec!["Fresh"]);
    assert_eq!(sink.len(), 1);
    let change = &sink.changes[0];
    assert_eq!(change.action, ChangeAction::Update);
    assert_eq!(change.field, "//Title");
    assert_eq!(change.old_value, "Legacy");
    assert_eq!(change.new_value, "Fresh");
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.applied, 1);
}

#[test]
fn test_update_is_idempotent() {
    let rules = rules("id,old_label,new_label\n123,Legacy,Fresh\n", UPDATE_SPEC);
    let (doc, _, _) = run(&rules, "<Study><Title>Legacy</Title></Study>", "123");
    let once = doc.to_xml_string().unwrap();

    let (doc, sink, stats) = run(&rules, &once, "123");
    assert_eq!(doc.to_xml_string().unwrap(), once);
    assert!(sink.is_empty());
    assert_eq!(stats.skipped, 1);
}

#[test]
fn test_update_leaves_other_values_untouched() {
    let rules = rules("id,old_label,new_label\n123,Legacy,Fresh\n", UPDATE_SPEC);
    let (doc, sink, _) = run(
        &rules,
        "<Study><Title><value>Legacy</value><value>Other</value></Title></Study>",
        "123",
    );
    assert_eq!(texts(&doc, "//Title/value"), vec!["Fresh", "Other"]);
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_update_matches_canonical_form() {
    let rules = rules(
        "id,old_label,new_label\n123,L\u{2019}Ain,Ain\n",
        UPDATE_SPEC,
    );
    let (doc, sink, _) = run(&rules, "<Study><Title>L'Ain</Title></Study>", "123");
    assert_eq!(texts(&doc, "//Title"), vec!["Ain"]);
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_update_exact_matching_opt_in() {
    let spec = UPDATE_SPEC.replace(r#""mode": "by_id","#, r#""mode": "by_id", "matching": "exact","#);
    let rules = rules("id,old_label,new_label\n123,L\u{2019}Ain,Ain\n", &spec);
    let (doc, sink, _) = run(&rules, "<Study><Title>L'Ain</Title></Study>", "123");
    assert_eq!(texts(&doc, "//Title"), vec!["L'Ain"]);
    assert!(sink.is_empty());
}

#[test]
fn test_update_with_blank_cell_is_skipped() {
    let rules = rules("id,old_label,new_label\n123,Legacy,\n", UPDATE_SPEC);
    let (doc, sink, stats) = run(&rules, "<Study><Title>Legacy</Title></Study>", "123");
    assert_eq!(texts(&doc, "//Title"), vec!["Legacy"]);
    assert!(sink.is_empty());
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.skipped, 1);
}

#[test]
fn test_by_id_without_matching_row_changes_nothing() {
    let rules = rules("id,old_label,new_label\n123,Legacy,Fresh\n", UPDATE_SPEC);
    let (doc, sink, stats) = run(&rules, "<Study><Title>Legacy</Title></Study>", "999");
    assert_eq!(texts(&doc, "//Title"), vec!["Legacy"]);
    assert!(sink.is_empty());
    assert_eq!(stats, TransformStats::default());
}

const ADD_SPEC: &str = r#"{
  "mode": "by_id",
  "file_id_column": "id",
  "operations": [
    {"type": "add", "to": {"col": "note", "xpath": "Notes/Note"}}
  ]
}"#;

#[test]
fn test_add_blank_value_is_noop() {
    let rules = rules("id,note\n123,\n", ADD_SPEC);
    let xml = "<Study><Notes/></Study>";
    let (doc, sink, _) = run(&rules, xml, "123");
    assert_eq!(
        doc.to_xml_string().unwrap(),
        Document::parse_str(xml).unwrap().to_xml_string().unwrap()
    );
    assert!(sink.is_empty());
}

#[test]
fn test_add_insignificant_value_is_noop() {
    let rules = rules("id,note\n123, - \n", ADD_SPEC);
    let (_, sink, _) = run(&rules, "<Study><Notes/></Study>", "123");
    assert!(sink.is_empty());
}

#[test]
fn test_add_creates_fresh_element_under_each_parent() {
    let rules = rules("id,note\n123,Recruiting & active\n", ADD_SPEC);
    let (doc, sink, stats) = run(&rules, "<Study><Notes/><Notes/></Study>", "123");

    let created = doc.select("//fresh:Note").unwrap();
    assert_eq!(created.len(), 2);
    let name = doc.name(created[0]).unwrap();
    assert_eq!(name.namespace.as_deref(), Some(FRESH_NS));
    assert_eq!(doc.text(created[0]), "Recruiting &amp; active");
    assert_eq!(sink.len(), 2);
    assert_eq!(sink.changes[0].field, "//Notes/Note");
    assert_eq!(stats.added, 2);

    let xml = doc.to_xml_string().unwrap();
    assert!(xml.contains(r#"<Study xmlns:fresh="urn:fresh-enrichment:v1">"#));
    assert!(xml.contains("<fresh:Note>Recruiting &amp; active</fresh:Note>"));
}

#[test]
fn test_add_falls_back_to_root() {
    let rules = rules("id,note\n123,Hello\n", ADD_SPEC);
    let (doc, _, _) = run(&rules, "<Study/>", "123");
    let created = doc.select("/Study/fresh:Note").unwrap();
    assert_eq!(created.len(), 1);
}

#[test]
fn test_add_not_fresh_creates_plain_element() {
    let spec = r#"{
      "mode": "general",
      "operations": [
        {"type": "add", "to": {"col": "note", "xpath": "Notes/Note", "fresh": false}}
      ]
    }"#;
    let rules = rules("note\nPlain\n", spec);
    let (doc, _, _) = run(&rules, "<Study><Notes/></Study>", "anything");
    let xml = doc.to_xml_string().unwrap();
    assert!(xml.contains("<Note>Plain</Note>"));
    assert!(!xml.contains("xmlns:fresh"));
}

#[test]
fn test_delete_removes_value_nodes() {
    let spec = r#"{
      "mode": "general",
      "operations": [
        {"type": "delete", "from": {"xpath": "Obsolete"}}
      ]
    }"#;
    let rules = rules("unused\nx\n", spec);
    let (doc, sink, stats) = run(
        &rules,
        "<Study><Obsolete><value>a</value><value>b</value></Obsolete><Keep>c</Keep></Study>",
        "1",
    );
    assert!(doc.select("//Obsolete/value").unwrap().is_empty());
    assert_eq!(doc.select("//Obsolete").unwrap().len(), 1);
    assert_eq!(sink.len(), 2);
    assert_eq!(sink.changes[1].old_value, "b");
    assert_eq!(stats.deleted, 2);
}

#[test]
fn test_delete_with_column_is_targeted() {
    let spec = r#"{
      "mode": "general",
      "operations": [
        {"type": "delete", "from": {"col": "drop", "xpath": "Keywords"}}
      ]
    }"#;
    let rules = rules("drop\nheart\n\n", spec);
    let (doc, sink, _) = run(
        &rules,
        "<Study><Keywords><value>heart</value><value>lung</value></Keywords></Study>",
        "1",
    );
    assert_eq!(texts(&doc, "//Keywords/value"), vec!["lung"]);
    assert_eq!(sink.len(), 1);
}

const REGIONS_SPEC: &str = r#"{
  "mode": "general",
  "operations": [
    {"type": "replace_set",
     "from": {"col": "ancienne", "xpath": "Category"},
     "to": {"col": "nouvelle", "xpath": "CategoryEN"}}
  ]
}"#;

#[test]
fn test_replace_set_general_mode() {
    let rules = rules("ancienne,nouvelle\nCardio,Cardiology\nNeuro,Neurology\n", REGIONS_SPEC);
    let (doc, sink, stats) = run(
        &rules,
        "<Study><Category>Cardio</Category><CategoryEN><value>Stale</value></CategoryEN></Study>",
        "42",
    );

    assert_eq!(texts(&doc, "//CategoryEN/value"), vec!["Cardiology"]);
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.changes[0].old_value, RESET_SENTINEL);
    assert_eq!(sink.changes[0].new_value, "Cardiology");
    assert_eq!(stats.attempts, 1);

    insta::assert_snapshot!(doc.to_xml_string().unwrap(), @r#"
    <?xml version="1.0" encoding="UTF-8"?>
    <Study>
      <Category>Cardio</Category>
      <CategoryEN>
        <value>Cardiology</value>
      </CategoryEN>
    </Study>
    "#);
}

#[test]
fn test_replace_set_is_total_across_targets() {
    let rules = rules("ancienne,nouvelle\nCardio,Cardiology\nNeuro,Neurology\n", REGIONS_SPEC);
    let (doc, sink, _) = run(
        &rules,
        "<Study>\
           <Category><value>Neuro</value><value>Unknown</value><value>Cardio</value></Category>\
           <CategoryEN><value>x</value><!-- note --><other/></CategoryEN>\
           <CategoryEN/>\
         </Study>",
        "1",
    );

    for target in doc.select("//CategoryEN").unwrap() {
        let values: Vec<_> = doc
            .children(target)
            .into_iter()
            .map(|child| doc.text(child))
            .collect();
        assert_eq!(values, vec!["Neurology", "Cardiology"]);
    }
    // Records are written once per operation, not once per target.
    assert_eq!(sink.len(), 2);
}

#[test]
fn test_replace_set_without_mapping_resets_once() {
    let rules = rules("ancienne,nouvelle\nCardio,Cardiology\n", REGIONS_SPEC);
    let (doc, sink, _) = run(
        &rules,
        "<Study><Category>Other</Category><CategoryEN><value>x</value></CategoryEN></Study>",
        "1",
    );
    assert!(doc.select("//CategoryEN/value").unwrap().is_empty());
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.changes[0].old_value, RESET_SENTINEL);
    assert_eq!(sink.changes[0].new_value, "");
}

#[test]
fn test_replace_set_rerun_records_nothing() {
    let rules = rules("ancienne,nouvelle\nCardio,Cardiology\n", REGIONS_SPEC);
    let (doc, _, _) = run(
        &rules,
        "<Study><Category>Cardio</Category><CategoryEN/></Study>",
        "1",
    );
    let once = doc.to_xml_string().unwrap();
    let (doc, sink, _) = run(&rules, &once, "1");
    assert_eq!(doc.to_xml_string().unwrap(), once);
    assert!(sink.is_empty());
}

#[test]
fn test_replace_set_by_id_uses_matched_rows_only() {
    let spec = r#"{
      "mode": "by_id",
      "file_id_column": "id",
      "operations": [
        {"type": "replace_set",
         "from": {"col": "ancienne", "xpath": "Category"},
         "to": {"col": "nouvelle", "xpath": "CategoryEN", "fresh": true}}
      ]
    }"#;
    let rules = rules(
        "id,ancienne,nouvelle\n1,Cardio,Cardiology\n2,Cardio,Heart\n",
        spec,
    );
    let (doc, _, _) = run(
        &rules,
        "<Study><Category>Cardio</Category><CategoryEN/></Study>",
        "2",
    );
    assert_eq!(texts(&doc, "//CategoryEN/fresh:value"), vec!["Heart"]);
}

#[test]
fn test_disabled_and_unknown_operations_are_skipped() {
    let spec = r#"{
      "mode": "general",
      "operations": [
        {"type": "merge"},
        {"type": "delete", "enabled": false, "from": {"xpath": "Title"}}
      ]
    }"#;
    let rules = rules("a\n1\n", spec);
    let (doc, sink, stats) = run(&rules, "<Study><Title>Keep</Title></Study>", "1");
    assert_eq!(texts(&doc, "//Title"), vec!["Keep"]);
    assert!(sink.is_empty());
    assert_eq!(stats.unknown, 1);
    assert_eq!(stats.attempts, 0);
}

#[test]
fn test_general_mode_applies_every_row() {
    let spec = r#"{
      "mode": "general",
      "operations": [
        {"type": "update",
         "from": {"col": "old"},
         "to": {"col": "new", "xpath": "Region/value"}}
      ]
    }"#;
    let rules = rules("old,new\nBretagne,Brittany\nCorse,Corsica\n", spec);
    let (doc, sink, stats) = run(
        &rules,
        "<Study><Region><value>Corse</value><value>Bretagne</value></Region></Study>",
        "any",
    );
    assert_eq!(texts(&doc, "//Region/value"), vec!["Corsica", "Brittany"]);
    assert_eq!(sink.len(), 2);
    assert_eq!(stats.attempts, 2);
}

#[test]
fn test_by_id_applies_every_matching_row() {
    let rules = rules(
        "id,old_label,new_label\n123,Legacy,Fresh\n123,Draft,Final\n999,Legacy,Other\n",
        UPDATE_SPEC,
    );
    let (doc, sink, stats) = run(
        &rules,
        "<Study><Title><value>Draft</value><value>Legacy</value></Title></Study>",
        "123",
    );
    assert_eq!(texts(&doc, "//Title/value"), vec!["Final", "Fresh"]);
    assert_eq!(sink.len(), 2);
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.updated, 2);
}

#[test]
fn test_by_id_adds_once_per_matching_row() {
    let rules = rules("id,note\n123,First\n123,Second\n7,Elsewhere\n", ADD_SPEC);
    let (doc, sink, stats) = run(&rules, "<Study><Notes/></Study>", "123");
    assert_eq!(texts(&doc, "//Notes/fresh:Note"), vec!["First", "Second"]);
    assert_eq!(sink.len(), 2);
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.added, 2);
}
