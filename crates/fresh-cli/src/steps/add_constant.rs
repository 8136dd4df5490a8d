use anyhow::Result;
use fresh_model::{Change, FRESH_NS, FRESH_PREFIX};
use fresh_transform::sanitize;
use tracing::debug;

use crate::config::{ConstantField, StepKind};
use crate::pipeline::{DocumentJob, Step, StepContext, StepOutcome};

/// Appends fixed-value elements under the document root. An element with
/// the same name and text already under the root is left alone.
pub struct AddConstant {
    constants: Vec<ConstantField>,
}

impl AddConstant {
    pub fn new(constants: Vec<ConstantField>) -> Self {
        Self { constants }
    }
}

impl Step for AddConstant {
    fn kind(&self) -> StepKind {
        StepKind::AddConstant
    }

    fn run(&self, _ctx: &StepContext<'_>, job: &mut DocumentJob<'_>) -> Result<StepOutcome> {
        let mut outcome = StepOutcome::default();
        for constant in &self.constants {
            let value = sanitize(&constant.value);
            let doc = &mut job.document;
            let namespace = if constant.fresh {
                let prefix = doc.ensure_namespace(FRESH_PREFIX, FRESH_NS);
                Some((prefix, FRESH_NS))
            } else {
                None
            };
            let name = match &namespace {
                Some((prefix, _)) => format!("{prefix}:{}", constant.tag),
                None => constant.tag.clone(),
            };
            let uri = namespace.as_ref().map(|(_, ns)| *ns);

            let root = doc.root();
            let present = doc.child_elements(root).any(|child| {
                doc.name(child).is_some_and(|qname| {
                    qname.local == constant.tag
                        && qname.namespace.as_deref() == uri
                }) && doc.text(child).trim() == value
            });
            if present {
                continue;
            }

            let element = doc.create_element(&constant.tag, uri);
            doc.set_text(element, &value)?;
            doc.append_child(root, element)?;
            debug!(field = %name, value = %value, "constant added");
            job.record(&mut outcome, Change::add(name, value));
        }
        Ok(outcome)
    }
}
