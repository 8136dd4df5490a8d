use std::collections::HashSet;

use anyhow::Result;
use fresh_model::Change;
use fresh_xml::{Document, NodeId};
use tracing::debug;

use crate::config::StepKind;
use crate::pipeline::{DocumentJob, Step, StepContext, StepOutcome};

/// Drops repeated siblings, then elements left with no content.
///
/// Siblings are duplicates when name, trimmed text and attribute set agree;
/// the first occurrence stays and each removal is recorded. Afterwards,
/// elements with blank text, no attributes and no children are removed
/// bottom-up (not recorded).
pub struct RemoveDuplicateEmpty;

type Signature = (String, String, Vec<(String, String)>);

fn signature(doc: &Document, id: NodeId) -> Option<Signature> {
    let name = doc.name(id)?;
    let mut attributes: Vec<(String, String)> = doc
        .attributes(id)
        .iter()
        .map(|attr| (attr.name.clone(), attr.value.clone()))
        .collect();
    attributes.sort();
    let qualified = match &name.namespace {
        Some(ns) => format!("{{{ns}}}{}", name.local),
        None => name.local.clone(),
    };
    let text = doc.text(id).trim().to_string();
    Some((qualified, text, attributes))
}

fn is_empty(doc: &Document, id: NodeId) -> bool {
    doc.is_element(id)
        && doc.text(id).trim().is_empty()
        && doc.attributes(id).is_empty()
        && doc.children(id).is_empty()
}

impl RemoveDuplicateEmpty {
    fn remove_duplicates(
        job: &mut DocumentJob<'_>,
        element: NodeId,
        outcome: &mut StepOutcome,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        let children = job.document.children(element);
        for child in children {
            let Some(signature) = signature(&job.document, child) else {
                continue;
            };
            if seen.contains(&signature) {
                let field = job
                    .document
                    .name(child)
                    .map(|name| name.to_string())
                    .unwrap_or_default();
                let old_value = job.document.text(child);
                job.document.remove(child);
                debug!(field = %field, "duplicate element removed");
                job.record(outcome, Change::delete(field, old_value));
            } else {
                seen.insert(signature);
                Self::remove_duplicates(job, child, outcome)?;
            }
        }
        Ok(())
    }

    fn remove_empty(doc: &mut Document, element: NodeId) -> usize {
        let mut removed = 0;
        for child in doc.children(element) {
            removed += Self::remove_empty(doc, child);
        }
        if element != doc.root() && is_empty(doc, element) {
            debug!(element = doc.local_name(element), "empty element removed");
            doc.remove(element);
            removed += 1;
        }
        removed
    }
}

impl Step for RemoveDuplicateEmpty {
    fn kind(&self) -> StepKind {
        StepKind::RemoveDuplicateEmpty
    }

    fn run(&self, _ctx: &StepContext<'_>, job: &mut DocumentJob<'_>) -> Result<StepOutcome> {
        let mut outcome = StepOutcome::default();
        let root = job.document.root();
        Self::remove_duplicates(job, root, &mut outcome)?;
        let removed = Self::remove_empty(&mut job.document, root);
        debug!(removed, "empty elements removed");
        Ok(outcome)
    }
}
