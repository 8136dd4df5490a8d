//! Mutable XML document tree backed by a `xot` arena.
//!
//! Nodes are addressed by [`NodeId`]. Removing an element only detaches it
//! from its parent, so every `NodeId` handed out during a transformation
//! stays valid until the document is dropped.
//!
//! Element text crosses this API in escaped wire form (`&amp;`, `&lt;`,
//! `&gt;`), which is the form correspondence tables compare against.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use quick_xml::escape::{partial_escape, unescape};
use xot::Xot;

use crate::error::{DocumentError, Result};
use crate::query::Snapshot;

/// Numbered prefixes tried when a requested prefix names another namespace.
const FALLBACK_PREFIX_LIMIT: usize = 64;

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) xot::Node);

/// Element name split into prefix, local part and resolved namespace URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}

impl QualifiedName {
    /// Build a name from its raw `prefix:local` form.
    pub fn parse(raw: &str, namespace: Option<String>) -> Self {
        match raw.split_once(':') {
            Some((prefix, local)) => Self {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
                namespace,
            },
            None => Self {
                prefix: None,
                local: raw.to_string(),
                namespace,
            },
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Attribute with its decoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// In-memory, mutable XML document.
pub struct Document {
    pub(crate) xot: Xot,
    pub(crate) node: xot::Node,
    pub(crate) root: xot::Node,
    /// Query view of the tree, rebuilt after the first query following an edit.
    pub(crate) snapshot: RefCell<Option<Snapshot>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Clone for Document {
    fn clone(&self) -> Self {
        Self {
            xot: self.xot.clone(),
            node: self.node,
            root: self.root,
            snapshot: RefCell::new(None),
        }
    }
}

impl Document {
    pub(crate) fn from_parts(xot: Xot, node: xot::Node, root: xot::Node) -> Self {
        Self {
            xot,
            node,
            root,
            snapshot: RefCell::new(None),
        }
    }

    fn touch(&mut self) {
        self.snapshot.get_mut().take();
    }

    pub fn root(&self) -> NodeId {
        NodeId(self.root)
    }

    /// Element name, or `None` for comments and other non-elements.
    pub fn name(&self, id: NodeId) -> Option<QualifiedName> {
        let element = self.xot.element(id.0)?;
        let (local, namespace) = self.xot.name_ns_str(element.name());
        let namespace_id = self.xot.namespace_for_name(element.name());
        let prefix = if namespace.is_empty() {
            None
        } else {
            self.xot
                .prefix_for_namespace(id.0, namespace_id)
                .map(|prefix| self.xot.prefix_str(prefix))
                .filter(|prefix| !prefix.is_empty())
                .map(str::to_string)
        };
        Some(QualifiedName {
            prefix,
            local: local.to_string(),
            namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        })
    }

    /// Local part of the element name (empty for non-elements).
    pub fn local_name(&self, id: NodeId) -> &str {
        self.xot
            .element(id.0)
            .map(|element| self.xot.local_name_str(element.name()))
            .unwrap_or("")
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.xot.is_element(id.0)
    }

    /// Text before the first child node, in escaped wire form. Empty when
    /// the element has no leading text.
    pub fn text(&self, id: NodeId) -> String {
        self.xot
            .first_child(id.0)
            .and_then(|child| self.xot.text_str(child))
            .map(|text| partial_escape(text).into_owned())
            .unwrap_or_default()
    }

    /// Replace the leading text. `wire` is in escaped form; an empty value
    /// removes the text.
    pub fn set_text(&mut self, id: NodeId, wire: &str) -> Result<()> {
        self.touch();
        let decoded = unescape(wire).unwrap_or(Cow::Borrowed(wire)).into_owned();
        let leading = self
            .xot
            .first_child(id.0)
            .filter(|child| self.xot.is_text(*child));
        match (leading, decoded.is_empty()) {
            (Some(text), true) => self.xot.remove(text).map_err(DocumentError::mutation),
            (Some(text), false) => {
                if let Some(value) = self.xot.text_mut(text) {
                    value.set(decoded);
                }
                Ok(())
            }
            (None, true) => Ok(()),
            (None, false) => {
                let text = self.xot.new_text(&decoded);
                self.xot
                    .prepend(id.0, text)
                    .map_err(DocumentError::mutation)
            }
        }
    }

    pub fn attributes(&self, id: NodeId) -> Vec<Attribute> {
        self.xot
            .attributes(id.0)
            .iter()
            .map(|(name, value)| Attribute {
                name: self.attribute_label(id, name),
                value: value.to_string(),
            })
            .collect()
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        self.attributes(id)
            .into_iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value)
    }

    /// Set or replace an unprefixed attribute. No-op on non-elements.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if !self.xot.is_element(id.0) {
            return;
        }
        self.touch();
        let name = self.xot.add_name(name);
        self.xot.attributes_mut(id.0).insert(name, value.into());
    }

    fn attribute_label(&self, id: NodeId, name: xot::NameId) -> String {
        let (local, namespace) = self.xot.name_ns_str(name);
        if namespace.is_empty() {
            return local.to_string();
        }
        let prefix = self
            .xot
            .prefix_for_namespace(id.0, self.xot.namespace_for_name(name))
            .map(|prefix| self.xot.prefix_str(prefix))
            .filter(|prefix| !prefix.is_empty());
        match prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    /// Parent element, `None` for the root and for detached nodes.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.xot
            .parent(id.0)
            .filter(|parent| self.xot.is_element(*parent))
            .map(NodeId)
    }

    /// Element, comment and processing-instruction children.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.xot
            .children(id.0)
            .filter(|child| !self.xot.is_text(*child))
            .map(NodeId)
            .collect()
    }

    /// Child elements in document order.
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.xot
            .children(id.0)
            .filter(|child| self.xot.is_element(*child))
            .map(NodeId)
    }

    /// Child elements whose local name equals `local`.
    pub fn children_named<'a>(
        &'a self,
        id: NodeId,
        local: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.child_elements(id)
            .filter(move |child| self.local_name(*child) == local)
    }

    /// Descendant elements of `id` in document order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.xot
            .descendants(id.0)
            .skip(1)
            .filter(|node| self.xot.is_element(*node))
            .map(NodeId)
            .collect()
    }

    /// Whether the node is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.xot.ancestors(id.0).any(|node| node == self.root)
    }

    /// Create a detached element. Its prefix is resolved from the namespace
    /// declarations in scope once it is attached; see
    /// [`Document::ensure_namespace`].
    pub fn create_element(&mut self, local: &str, namespace: Option<&str>) -> NodeId {
        let name = match namespace {
            Some(uri) => {
                let namespace = self.xot.add_namespace(uri);
                self.xot.add_name_ns(local, namespace)
            }
            None => self.xot.add_name(local),
        };
        NodeId(self.xot.new_element(name))
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.touch();
        if self.xot.parent(child.0).is_some() {
            self.xot.detach(child.0).map_err(DocumentError::mutation)?;
        }
        self.xot
            .append(parent.0, child.0)
            .map_err(DocumentError::mutation)
    }

    /// Detach a node from its parent. Returns false for the root or for an
    /// already detached node.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if id.0 == self.root || self.xot.parent(id.0).is_none() {
            return false;
        }
        self.touch();
        self.xot.detach(id.0).is_ok()
    }

    /// Detach every non-text child of `id` together with the text that
    /// follows it. Leading text is kept. Returns the removed children.
    pub fn remove_children(&mut self, id: NodeId) -> Vec<NodeId> {
        self.touch();
        let nodes: Vec<xot::Node> = self
            .xot
            .children(id.0)
            .skip_while(|child| self.xot.is_text(*child))
            .collect();
        let mut removed = Vec::new();
        for node in nodes {
            if self.xot.is_text(node) {
                let _ = self.xot.remove(node);
            } else if self.xot.detach(node).is_ok() {
                removed.push(NodeId(node));
            }
        }
        removed
    }

    /// Namespace URI bound to `prefix` by any declaration, searching from
    /// the root downwards.
    pub fn namespace_for_prefix(&self, prefix: &str) -> Option<String> {
        self.namespace_declarations_ordered()
            .into_iter()
            .find(|(bound, _)| bound == prefix)
            .map(|(_, uri)| uri)
    }

    /// All prefixed namespace declarations, first declaration wins.
    pub fn namespace_declarations(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for (prefix, uri) in self.namespace_declarations_ordered() {
            out.entry(prefix).or_insert(uri);
        }
        out
    }

    fn namespace_declarations_ordered(&self) -> Vec<(String, String)> {
        self.xot
            .descendants(self.root)
            .filter(|node| self.xot.is_element(*node))
            .flat_map(|node| {
                self.xot
                    .namespaces(node)
                    .iter()
                    .map(|(prefix, namespace)| {
                        (
                            self.xot.prefix_str(prefix).to_string(),
                            self.xot.namespace_str(*namespace).to_string(),
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect()
    }

    /// Make sure `uri` is declared on the root and return the prefix bound
    /// to it. `prefix` is used unless it already names another namespace,
    /// in which case an existing prefix for `uri` or a numbered variant
    /// (`prefix1`, `prefix2`, ...) is declared instead.
    pub fn ensure_namespace(&mut self, prefix: &str, uri: &str) -> String {
        let declarations = self.namespace_declarations_ordered();
        let bound_to = |candidate: &str| {
            declarations
                .iter()
                .find(|(bound, _)| bound == candidate)
                .map(|(_, bound_uri)| bound_uri.as_str())
        };
        match bound_to(prefix) {
            Some(existing) if existing == uri => return prefix.to_string(),
            None => {
                self.declare_on_root(prefix, uri);
                return prefix.to_string();
            }
            Some(_) => {}
        }
        let root_declares = self
            .xot
            .namespaces(self.root)
            .iter()
            .map(|(bound, namespace)| {
                (
                    self.xot.prefix_str(bound).to_string(),
                    self.xot.namespace_str(*namespace).to_string(),
                )
            })
            .find(|(bound, namespace)| !bound.is_empty() && namespace == uri);
        if let Some((existing, _)) = root_declares {
            return existing;
        }
        let candidate = (1..=FALLBACK_PREFIX_LIMIT)
            .map(|n| format!("{prefix}{n}"))
            .find(|candidate| bound_to(candidate).is_none())
            .unwrap_or_else(|| format!("{prefix}{}", FALLBACK_PREFIX_LIMIT + 1));
        self.declare_on_root(&candidate, uri);
        candidate
    }

    fn declare_on_root(&mut self, prefix: &str, uri: &str) {
        self.touch();
        let prefix = self.xot.add_prefix(prefix);
        let namespace = self.xot.add_namespace(uri);
        self.xot.namespaces_mut(self.root).insert(prefix, namespace);
    }

    /// Child position path from the document node down to `id`, counting
    /// element siblings only.
    pub(crate) fn element_path(&self, id: NodeId) -> Vec<usize> {
        element_path(&self.xot, id.0)
    }

    /// Follow a path produced by [`element_path`] from the document node.
    pub(crate) fn follow_path(&self, path: &[usize]) -> Option<NodeId> {
        let mut current = self.node;
        for index in path {
            current = self
                .xot
                .children(current)
                .filter(|child| self.xot.is_element(*child))
                .nth(*index)?;
        }
        Some(NodeId(current))
    }
}

/// Positions among element siblings from the document node down to `node`.
pub(crate) fn element_path(xot: &Xot, node: xot::Node) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = node;
    while let Some(parent) = xot.parent(current) {
        let index = xot
            .children(parent)
            .filter(|child| xot.is_element(*child))
            .position(|child| child == current)
            .unwrap_or_default();
        path.push(index);
        current = parent;
    }
    path.reverse();
    path
}
