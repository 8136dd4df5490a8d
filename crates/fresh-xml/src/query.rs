//! XPath selection over a [`Document`], evaluated with `xee-xpath`.
//!
//! Expressions run against a read-only snapshot of the tree that is rebuilt
//! lazily after edits. Element results are mapped back to live nodes by
//! their position path, so callers always receive handles into the
//! mutable document.
//!
//! Prefixes resolve through the namespace declarations found in the
//! document, overlaid with any caller-supplied bindings. A prefix bound
//! nowhere selects nothing. Unprefixed names follow XPath rules and match
//! elements in no namespace only.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use xee_xpath::context::StaticContextBuilder;
use xee_xpath::query::SequenceQuery;
use xee_xpath::{Documents, Queries, Query};

use crate::document::{Document, NodeId, element_path};
use crate::error::{DocumentError, Result};

/// Namespace stem given to prefixes nothing declares.
const UNBOUND_NAMESPACE: &str = "urn:unbound:";

/// Prefixes the XPath static context always knows.
const PREDECLARED: [&str; 8] = ["xml", "xs", "fn", "math", "map", "array", "err", "output"];

/// A syntactically valid XPath expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    source: String,
}

impl XPath {
    /// Compile `source` once to validate it. Prefixes are not required to
    /// be bound at this point.
    pub fn parse(source: &str) -> Result<Self> {
        compile(source, &HashMap::new())?;
        Ok(Self {
            source: source.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for XPath {
    type Err = DocumentError;

    fn from_str(source: &str) -> Result<Self> {
        Self::parse(source)
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Document {
    /// Evaluate `query` with the root element as context item and return
    /// the selected elements in document order.
    pub fn select(&self, query: &str) -> Result<Vec<NodeId>> {
        self.evaluate(query, &HashMap::new())
    }

    /// Evaluate a compiled expression with extra prefix bindings. Caller
    /// bindings take precedence over the document's own declarations.
    pub fn select_xpath(
        &self,
        xpath: &XPath,
        prefixes: &HashMap<String, String>,
    ) -> Result<Vec<NodeId>> {
        self.evaluate(xpath.as_str(), prefixes)
    }

    fn evaluate(&self, source: &str, prefixes: &HashMap<String, String>) -> Result<Vec<NodeId>> {
        let mut bindings = self.namespace_declarations();
        bindings.extend(
            prefixes
                .iter()
                .map(|(prefix, uri)| (prefix.clone(), uri.clone())),
        );
        let query = compile(source, &bindings)?;

        let mut slot = self.snapshot.borrow_mut();
        let mut snapshot = match slot.take() {
            Some(snapshot) => snapshot,
            None => Snapshot::build(self)?,
        };
        let selected = snapshot.select(&query);
        *slot = Some(snapshot);

        let paths = selected.map_err(|err| DocumentError::Query {
            query: source.to_string(),
            reason: err.to_string(),
        })?;
        Ok(paths
            .iter()
            .filter_map(|path| self.follow_path(path))
            .collect())
    }
}

/// Serialized copy of a document loaded into an XPath engine.
pub(crate) struct Snapshot {
    documents: Documents,
    root: xot::Node,
}

impl Snapshot {
    fn build(doc: &Document) -> Result<Self> {
        let xml = doc.xot.to_string(doc.node).map_err(DocumentError::serialize)?;
        let mut documents = Documents::new();
        let handle = documents
            .add_string_without_uri(&xml)
            .map_err(DocumentError::serialize)?;
        let root = documents
            .document_node(handle)
            .and_then(|node| documents.xot().document_element(node).ok())
            .ok_or(DocumentError::Empty)?;
        Ok(Self { documents, root })
    }

    fn select(&mut self, query: &SequenceQuery) -> xee_xpath::error::Result<Vec<Vec<usize>>> {
        let sequence = query.execute(&mut self.documents, self.root)?;
        let xot = self.documents.xot();
        Ok(sequence
            .iter()
            .filter_map(|item| item.to_node().ok())
            .filter(|node| xot.is_element(*node))
            .map(|node| element_path(xot, node))
            .collect())
    }
}

fn compile(source: &str, bindings: &HashMap<String, String>) -> Result<SequenceQuery> {
    let unbound: Vec<(String, String)> = referenced_prefixes(source)
        .into_iter()
        .filter(|prefix| !bindings.contains_key(prefix) && !PREDECLARED.contains(&prefix.as_str()))
        .map(|prefix| {
            let uri = format!("{UNBOUND_NAMESPACE}{prefix}");
            (prefix, uri)
        })
        .collect();

    let mut context = StaticContextBuilder::default();
    for (prefix, uri) in bindings
        .iter()
        .chain(unbound.iter().map(|(prefix, uri)| (prefix, uri)))
    {
        // An empty prefix would change the default element namespace.
        if !prefix.is_empty() {
            context.add_namespace(prefix, uri);
        }
    }
    Queries::new(context)
        .sequence(source)
        .map_err(|err| DocumentError::Query {
            query: source.to_string(),
            reason: err.to_string(),
        })
}

/// Prefixes used in qualified names, outside string literals and `Q{}`
/// braced URIs.
fn referenced_prefixes(source: &str) -> Vec<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut prefixes: Vec<String> = Vec::new();
    let mut quote: Option<char> = None;
    let mut braced = false;
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            idx += 1;
            continue;
        }
        if braced {
            braced = ch != '}';
            idx += 1;
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            'Q' if chars.get(idx + 1) == Some(&'{') => {
                braced = true;
                idx += 2;
                continue;
            }
            _ if is_name_start(ch) => {
                let start = idx;
                while idx < chars.len() && is_name_char(chars[idx]) {
                    idx += 1;
                }
                let qualifies = chars.get(idx) == Some(&':')
                    && chars
                        .get(idx + 1)
                        .is_some_and(|next| is_name_start(*next) || *next == '*');
                if qualifies {
                    let prefix: String = chars[start..idx].iter().collect();
                    if !prefixes.contains(&prefix) {
                        prefixes.push(prefix);
                    }
                }
                continue;
            }
            _ => {}
        }
        idx += 1;
    }
    prefixes
}

fn is_name_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.')
}
