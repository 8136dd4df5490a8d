//! Applies a [`RuleSet`] to a document.

use std::collections::HashMap;

use fresh_model::{Change, ChangeAction, ChangeSink, FRESH_NS, FRESH_PREFIX, RESET_SENTINEL};
use fresh_xml::{Document, NodeId};
use tracing::{debug, warn};

use crate::error::{Result, RuleError};
use crate::loader::{CompiledOperation, CompiledPath, Plan, RuleSet};
use crate::matcher::{ValueMatcher, candidate_rows};
use crate::sanitize::{is_significant, sanitize};
use crate::table::{Row, cell};

/// Name of the generic value-holder element.
const VALUE_TAG: &str = "value";

/// Counters for one `apply` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Operation × row pairs tried (one per `replace_set` operation).
    pub attempts: usize,
    /// Mutations performed; equals the number of change records.
    pub applied: usize,
    /// Attempts that changed nothing.
    pub skipped: usize,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Operations ignored because their type is not implemented.
    pub unknown: usize,
}

impl TransformStats {
    fn count(&mut self, action: ChangeAction) {
        self.applied += 1;
        match action {
            ChangeAction::Add => self.added += 1,
            ChangeAction::Update => self.updated += 1,
            ChangeAction::Delete => self.deleted += 1,
        }
    }

    /// Fold another call's counters into this one.
    pub fn merge(&mut self, other: &TransformStats) {
        self.attempts += other.attempts;
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.added += other.added;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unknown += other.unknown;
    }
}

/// Effective text-bearing nodes of `node`: its `value` children when it has
/// any, otherwise the node itself.
pub fn value_nodes(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let values: Vec<NodeId> = doc.children_named(node, VALUE_TAG).collect();
    if values.is_empty() { vec![node] } else { values }
}

/// Executes the operations of a rule set.
pub struct Transformer<'a> {
    rules: &'a RuleSet,
    matcher: ValueMatcher,
    prefixes: HashMap<String, String>,
}

/// Mutable state threaded through one `apply` call.
struct Session<'s> {
    sink: &'s mut dyn ChangeSink,
    stats: TransformStats,
}

impl Session<'_> {
    fn emit(&mut self, change: Change) -> Result<()> {
        self.stats.count(change.action);
        self.sink.record(change)?;
        Ok(())
    }
}

impl<'a> Transformer<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        let mut prefixes = HashMap::new();
        prefixes.insert(FRESH_PREFIX.to_string(), FRESH_NS.to_string());
        Self {
            rules,
            matcher: ValueMatcher::new(rules.spec().matching),
            prefixes,
        }
    }

    /// Apply every enabled operation to `doc` for the document identified by
    /// `document_id`, sending one change per mutation to `sink`.
    pub fn apply(
        &self,
        doc: &mut Document,
        document_id: &str,
        sink: &mut dyn ChangeSink,
    ) -> Result<TransformStats> {
        let rows = candidate_rows(self.rules, document_id);
        let mut session = Session {
            sink,
            stats: TransformStats::default(),
        };
        if rows.is_empty() {
            debug!(
                document_id,
                table = self.rules.table().name(),
                "no matching rows"
            );
            return Ok(session.stats);
        }

        for op in self.rules.operations() {
            match &op.plan {
                Plan::Unknown { kind } => {
                    warn!(operation = op.index, kind = %kind, "unknown operation type ignored");
                    session.stats.unknown += 1;
                }
                Plan::ReplaceSet { .. } => {
                    session.stats.attempts += 1;
                    let before = session.stats.applied;
                    self.replace_set(doc, op, &rows, &mut session)?;
                    if session.stats.applied == before {
                        session.stats.skipped += 1;
                    }
                }
                _ => {
                    for row in &rows {
                        session.stats.attempts += 1;
                        let before = session.stats.applied;
                        self.apply_row(doc, op, row, &mut session)?;
                        if session.stats.applied == before {
                            session.stats.skipped += 1;
                        }
                    }
                }
            }
        }
        Ok(session.stats)
    }

    fn select(&self, doc: &Document, index: usize, path: &CompiledPath) -> Result<Vec<NodeId>> {
        doc.select_xpath(&path.query, &self.prefixes)
            .map_err(|source| RuleError::InvalidPath { index, source })
    }

    fn apply_row(
        &self,
        doc: &mut Document,
        op: &CompiledOperation,
        row: &Row,
        session: &mut Session<'_>,
    ) -> Result<()> {
        match &op.plan {
            Plan::Update {
                from_col,
                to_col,
                target,
            } => self.update(doc, op.index, row, from_col, to_col, target, session),
            Plan::Add {
                to_col,
                parent,
                tag,
                field,
                fresh,
            } => self.add(doc, op.index, cell(row, to_col), parent, tag, field, *fresh, session),
            Plan::Delete { from_col, source } => {
                self.delete(doc, op.index, row, from_col.as_deref(), source, session)
            }
            Plan::ReplaceSet { .. } | Plan::Unknown { .. } => Ok(()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn update(
        &self,
        doc: &mut Document,
        index: usize,
        row: &Row,
        from_col: &str,
        to_col: &str,
        target: &CompiledPath,
        session: &mut Session<'_>,
    ) -> Result<()> {
        let from_raw = cell(row, from_col);
        let to_raw = cell(row, to_col);
        if from_raw.is_empty() || to_raw.is_empty() {
            debug!(operation = index, "update skipped: empty from/to value");
            return Ok(());
        }
        let expected = self.matcher.key_raw(from_raw);
        let new_value = sanitize(to_raw);

        let nodes = self.select(doc, index, target)?;
        if nodes.is_empty() {
            debug!(operation = index, path = %target.text, "update skipped: no nodes");
            return Ok(());
        }
        for node in nodes {
            for value_node in value_nodes(doc, node) {
                let current = sanitize(&doc.text(value_node));
                if self.matcher.key(&current) != expected || current == new_value {
                    continue;
                }
                doc.set_text(value_node, &new_value)?;
                debug!(
                    operation = index,
                    path = %target.text,
                    old = %current,
                    new = %new_value,
                    "updated"
                );
                session.emit(Change::update(&target.text, current, new_value.clone()))?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add(
        &self,
        doc: &mut Document,
        index: usize,
        raw: &str,
        parent: &CompiledPath,
        tag: &str,
        field: &str,
        fresh: bool,
        session: &mut Session<'_>,
    ) -> Result<()> {
        let value = sanitize(raw);
        if !is_significant(&value) {
            debug!(operation = index, path = field, "add skipped: value not significant");
            return Ok(());
        }
        let mut parents = self.select(doc, index, parent)?;
        if parents.is_empty() {
            debug!(operation = index, path = %parent.text, "parent not found, adding under root");
            parents.push(doc.root());
        }
        for parent_node in parents {
            let element = create_element(doc, tag, fresh);
            doc.set_text(element, &value)?;
            doc.append_child(parent_node, element)?;
            debug!(operation = index, path = field, value = %value, "added");
            session.emit(Change::add(field, value.clone()))?;
        }
        Ok(())
    }

    fn delete(
        &self,
        doc: &mut Document,
        index: usize,
        row: &Row,
        from_col: Option<&str>,
        source: &CompiledPath,
        session: &mut Session<'_>,
    ) -> Result<()> {
        let expected = match from_col {
            Some(column) => {
                let raw = cell(row, column);
                if raw.is_empty() {
                    debug!(operation = index, "delete skipped: empty from value");
                    return Ok(());
                }
                Some(self.matcher.key_raw(raw))
            }
            None => None,
        };

        let nodes = self.select(doc, index, source)?;
        if nodes.is_empty() {
            debug!(operation = index, path = %source.text, "delete skipped: no nodes");
            return Ok(());
        }
        for node in nodes {
            for value_node in value_nodes(doc, node) {
                if !doc.is_attached(value_node) {
                    continue;
                }
                let current = sanitize(&doc.text(value_node));
                if expected
                    .as_ref()
                    .is_some_and(|key| *key != self.matcher.key(&current))
                {
                    continue;
                }
                if doc.remove(value_node) {
                    debug!(operation = index, path = %source.text, old = %current, "deleted");
                    session.emit(Change::delete(&source.text, current))?;
                }
            }
        }
        Ok(())
    }

    fn replace_set(
        &self,
        doc: &mut Document,
        op: &CompiledOperation,
        rows: &[&Row],
        session: &mut Session<'_>,
    ) -> Result<()> {
        let Plan::ReplaceSet {
            from_col,
            to_col,
            source,
            target,
            fresh,
        } = &op.plan
        else {
            return Ok(());
        };

        let lookup: Vec<(String, &Row)> = rows
            .iter()
            .filter(|row| !cell(row, from_col).is_empty())
            .map(|row| (self.matcher.key_raw(cell(row, from_col)), *row))
            .collect();

        let mut mapped = Vec::new();
        for node in self.select(doc, op.index, source)? {
            for value_node in value_nodes(doc, node) {
                let current = sanitize(&doc.text(value_node));
                if current.is_empty() {
                    continue;
                }
                let key = self.matcher.key(&current);
                let Some((_, row)) = lookup.iter().find(|(candidate, _)| *candidate == key) else {
                    debug!(operation = op.index, value = %current, "replace_set: no mapping");
                    continue;
                };
                let new_value = sanitize(cell(row, to_col));
                if is_significant(&new_value) {
                    mapped.push(new_value);
                }
            }
        }

        let targets = self.select(doc, op.index, target)?;
        if targets.is_empty() {
            debug!(operation = op.index, path = %target.text, "replace_set skipped: no target");
            return Ok(());
        }
        if targets
            .iter()
            .all(|node| holds_exactly(doc, *node, &mapped))
        {
            debug!(operation = op.index, path = %target.text, "replace_set: already up to date");
            return Ok(());
        }

        let mut removed = 0;
        for node in &targets {
            removed += doc.remove_children(*node).len();
            for value in &mapped {
                let element = create_element(doc, VALUE_TAG, *fresh);
                doc.set_text(element, value)?;
                doc.append_child(*node, element)?;
            }
        }

        // One record set per operation, however many targets were rebuilt.
        if mapped.is_empty() {
            if removed > 0 {
                session.emit(Change::update(&target.text, RESET_SENTINEL, ""))?;
            }
        } else {
            for value in &mapped {
                session.emit(Change::update(&target.text, RESET_SENTINEL, value.clone()))?;
            }
        }
        debug!(
            operation = op.index,
            path = %target.text,
            targets = targets.len(),
            values = mapped.len(),
            "replace_set applied"
        );
        Ok(())
    }
}

/// Whether `node` already consists of exactly one plain `value` child per
/// entry of `values`, in order.
fn holds_exactly(doc: &Document, node: NodeId, values: &[String]) -> bool {
    let children = doc.children(node);
    children.len() == values.len()
        && children.iter().zip(values).all(|(child, value)| {
            doc.local_name(*child) == VALUE_TAG
                && doc.attributes(*child).is_empty()
                && doc.children(*child).is_empty()
                && doc.text(*child) == *value
        })
}

/// Create a detached element named `tag`, in the enrichment namespace when
/// `fresh` is set. A prefixed `tag` takes the namespace the document binds
/// to that prefix.
fn create_element(doc: &mut Document, tag: &str, fresh: bool) -> NodeId {
    let (prefix, local) = match tag.rsplit_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, tag),
    };
    if fresh {
        doc.ensure_namespace(FRESH_PREFIX, FRESH_NS);
        return doc.create_element(local, Some(FRESH_NS));
    }
    let namespace = prefix.and_then(|prefix| doc.namespace_for_prefix(prefix));
    doc.create_element(local, namespace.as_deref())
}
