//! Integration tests for parsing, mutation and serialization.

use fresh_xml::{Document, DocumentError};

const FRESH_NS: &str = "urn:fresh-enrichment:v1";

const STUDY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Study xmlns:fresh="urn:fresh-enrichment:v1">
  <Title>Legacy</Title>
  <Keywords>
    <value>heart</value>
    <value>lung</value>
  </Keywords>
  <!-- imported -->
  <fresh:Nation>France</fresh:Nation>
</Study>
"#;

#[test]
fn test_round_trip_is_byte_stable() {
    let doc = Document::parse(STUDY.as_bytes()).unwrap();
    let out = doc.to_xml_string().unwrap();
    assert_eq!(out, STUDY);
}

#[test]
fn test_set_text_and_serialize() {
    let mut doc = Document::parse_str("<Study><Title>Legacy</Title></Study>").unwrap();
    let title = doc.select("//Title").unwrap()[0];
    doc.set_text(title, "Fresh &amp; new").unwrap();
    insta::assert_snapshot!(doc.to_xml_string().unwrap(), @r#"
    <?xml version="1.0" encoding="UTF-8"?>
    <Study>
      <Title>Fresh &amp; new</Title>
    </Study>
    "#);
}

#[test]
fn test_create_qualified_element_declares_namespace() {
    let mut doc = Document::parse_str("<Study/>").unwrap();
    let root = doc.root();
    let prefix = doc.ensure_namespace("fresh", FRESH_NS);
    let nation = doc.create_element("Nation", Some(FRESH_NS));
    doc.set_text(nation, "Italy").unwrap();
    doc.append_child(root, nation).unwrap();

    assert_eq!(prefix, "fresh");
    let out = doc.to_xml_string().unwrap();
    assert!(out.contains(r#"<Study xmlns:fresh="urn:fresh-enrichment:v1">"#));
    assert!(out.contains("<fresh:Nation>Italy</fresh:Nation>"));

    // Declaring again keeps a single binding.
    assert_eq!(doc.ensure_namespace("fresh", FRESH_NS), "fresh");
    assert_eq!(doc.namespace_declarations().len(), 1);
}

#[test]
fn test_ensure_namespace_avoids_conflicting_prefix() {
    let mut doc =
        Document::parse_str(r#"<Study xmlns:fresh="urn:someone-else"><fresh:Old/></Study>"#)
            .unwrap();
    let root = doc.root();

    let prefix = doc.ensure_namespace("fresh", FRESH_NS);
    assert_eq!(prefix, "fresh1");
    assert_eq!(doc.namespace_for_prefix("fresh").as_deref(), Some("urn:someone-else"));
    assert_eq!(doc.namespace_for_prefix("fresh1").as_deref(), Some(FRESH_NS));

    let nation = doc.create_element("Nation", Some(FRESH_NS));
    doc.append_child(root, nation).unwrap();
    let out = doc.to_xml_string().unwrap();
    assert!(out.contains("<fresh:Old/>"));
    assert!(out.contains("<fresh1:Nation/>"));

    // The existing element keeps its namespace; the new one gets ours.
    let old = doc.select("//fresh:Old").unwrap()[0];
    assert_eq!(doc.name(old).unwrap().namespace.as_deref(), Some("urn:someone-else"));
    let name = doc.name(nation).unwrap();
    assert_eq!(name.namespace.as_deref(), Some(FRESH_NS));
    assert_eq!(name.to_string(), "fresh1:Nation");

    // Asking again reuses the numbered prefix.
    assert_eq!(doc.ensure_namespace("fresh", FRESH_NS), "fresh1");
}

#[test]
fn test_remove_children_empties_element() {
    let mut doc = Document::parse(STUDY.as_bytes()).unwrap();
    let keywords = doc.select("//Keywords").unwrap()[0];
    let removed = doc.remove_children(keywords);
    assert_eq!(removed.len(), 2);
    assert!(doc.children(keywords).is_empty());
    assert!(doc.to_xml_string().unwrap().contains("<Keywords/>"));
}

#[test]
fn test_comments_are_preserved() {
    let doc = Document::parse(STUDY.as_bytes()).unwrap();
    let children = doc.children(doc.root());
    assert_eq!(children.len(), 4);
    assert!(!doc.is_element(children[2]));
    assert!(doc.to_xml_string().unwrap().contains("  <!-- imported -->\n"));
}

#[test]
fn test_attribute_values_are_decoded_and_reescaped() {
    let mut doc = Document::parse_str(r#"<a label="x &amp; y"/>"#).unwrap();
    let root = doc.root();
    assert_eq!(doc.attribute(root, "label").as_deref(), Some("x & y"));
    doc.set_attribute(root, "uri", "http://example.org/?a=1&b=2");
    let out = doc.to_xml_string().unwrap();
    assert!(out.contains(r#"label="x &amp; y""#));
    assert!(out.contains(r#"uri="http://example.org/?a=1&amp;b=2""#));
}

#[test]
fn test_namespace_declarations_are_not_attributes() {
    let doc = Document::parse(STUDY.as_bytes()).unwrap();
    assert!(doc.attributes(doc.root()).is_empty());
    assert_eq!(doc.namespace_for_prefix("fresh").as_deref(), Some(FRESH_NS));
}

#[test]
fn test_write_to_path_creates_directories() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested").join("out.xml");
    let doc = Document::parse_str("<Study/>").unwrap();
    doc.write_to_path(&target).unwrap();
    let written = std::fs::read_to_string(&target).unwrap();
    assert_eq!(
        written,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Study/>\n"
    );
}

#[test]
fn test_clone_is_independent() {
    let original = Document::parse_str("<Study><Title>A</Title></Study>").unwrap();
    let mut copy = original.clone();
    let title = copy.select("//Title").unwrap()[0];
    copy.set_text(title, "B").unwrap();
    assert!(original.to_xml_string().unwrap().contains("<Title>A</Title>"));
    assert!(copy.to_xml_string().unwrap().contains("<Title>B</Title>"));
}

#[test]
fn test_malformed_input_reports_parse_error() {
    let err = Document::parse(b"<Study><Title>oops</Study>").unwrap_err();
    assert!(matches!(err, DocumentError::Parse { .. }));
    assert!(err.to_string().starts_with("malformed document"));
}

#[test]
fn test_invalid_utf8_is_rejected() {
    let err = Document::parse(&[b'<', b'a', b'>', 0xff, b'<', b'/', b'a', b'>']).unwrap_err();
    assert!(matches!(err, DocumentError::Encoding(_)));
}
