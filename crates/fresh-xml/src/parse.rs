//! Parsing documents from bytes with `xot`.

use xot::Xot;

use crate::document::Document;
use crate::error::{DocumentError, Result};

impl Document {
    /// Parse a UTF-8 encoded document.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let input = std::str::from_utf8(bytes)?;
        Self::parse_str(input)
    }

    /// Parse a document from a string slice. Whitespace-only text between
    /// elements is dropped; it is regenerated on output.
    pub fn parse_str(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(DocumentError::Empty);
        }
        let mut xot = Xot::new();
        let node = xot.parse(input).map_err(|err| DocumentError::Parse {
            message: err.to_string(),
        })?;
        let root = xot.document_element(node).map_err(|_| DocumentError::Empty)?;
        xot.remove_insignificant_whitespace(node);
        Ok(Document::from_parts(xot, node, root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_text() {
        let doc = Document::parse_str("<root><a>one</a><b><c>two</c></b></root>").unwrap();
        let root = doc.root();
        let children: Vec<_> = doc.child_elements(root).collect();
        assert_eq!(children.len(), 2);
        assert_eq!(doc.text(children[0]), "one");
        assert_eq!(doc.local_name(children[1]), "b");
    }

    #[test]
    fn references_are_decoded_then_reescaped() {
        let doc = Document::parse_str("<root>Fish &amp; chips &#233;t&#xE9; &lt;3</root>").unwrap();
        assert_eq!(doc.text(doc.root()), "Fish &amp; chips été &lt;3");
    }

    #[test]
    fn resolves_prefixed_namespaces() {
        let doc = Document::parse_str(
            r#"<root xmlns:fresh="urn:fresh-enrichment:v1"><fresh:Nation/></root>"#,
        )
        .unwrap();
        let nation = doc.child_elements(doc.root()).next().unwrap();
        let name = doc.name(nation).unwrap();
        assert_eq!(name.local, "Nation");
        assert_eq!(name.prefix.as_deref(), Some("fresh"));
        assert_eq!(name.namespace.as_deref(), Some("urn:fresh-enrichment:v1"));
    }

    #[test]
    fn cdata_is_escaped_into_wire_form() {
        let doc = Document::parse_str("<root><![CDATA[a < b & c]]></root>").unwrap();
        assert_eq!(doc.text(doc.root()), "a &lt; b &amp; c");
    }

    #[test]
    fn mixed_content_spacing_survives() {
        let doc = Document::parse_str("<p>Hello <b>big</b> world</p>").unwrap();
        assert_eq!(doc.text(doc.root()), "Hello ");
    }

    #[test]
    fn rejects_mismatched_end_tag() {
        let err = Document::parse_str("<root><a></b></root>").unwrap_err();
        assert!(matches!(err, DocumentError::Parse { .. }));
    }

    #[test]
    fn rejects_empty_input() {
        let err = Document::parse_str("   ").unwrap_err();
        assert!(matches!(err, DocumentError::Empty));
    }

    #[test]
    fn rejects_unclosed_root() {
        let err = Document::parse_str("<root><a>x</a>").unwrap_err();
        assert!(matches!(err, DocumentError::Parse { .. }));
    }

    #[test]
    fn rejects_undeclared_entities() {
        let err = Document::parse_str("<root>caf&eacute;</root>").unwrap_err();
        assert!(matches!(err, DocumentError::Parse { .. }));
    }
}
