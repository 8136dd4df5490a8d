use anyhow::Result;
use fresh_model::Change;
use fresh_xml::NodeId;
use tracing::debug;

use crate::config::StepKind;
use crate::pipeline::{DocumentJob, Step, StepContext, StepOutcome};

/// For `value` children of the configured containers holding
/// `Category: detail`, appends a sibling `value` holding `Category`.
pub struct AddParentCategory {
    tags: Vec<String>,
}

impl AddParentCategory {
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags }
    }
}

/// Text before the first colon, when there is one and it is not blank.
fn parent_category(text: &str) -> Option<&str> {
    let (head, _) = text.split_once(':')?;
    let head = head.trim();
    (!head.is_empty()).then_some(head)
}

impl Step for AddParentCategory {
    fn kind(&self) -> StepKind {
        StepKind::AddParentCategory
    }

    fn run(&self, _ctx: &StepContext<'_>, job: &mut DocumentJob<'_>) -> Result<StepOutcome> {
        let mut outcome = StepOutcome::default();
        for tag in &self.tags {
            let doc = &job.document;
            let containers: Vec<NodeId> = doc
                .descendants(doc.root())
                .into_iter()
                .filter(|id| doc.local_name(*id) == tag.as_str())
                .collect();
            for container in containers {
                let texts: Vec<String> = job
                    .document
                    .children_named(container, "value")
                    .map(|value| job.document.text(value).trim().to_string())
                    .collect();
                for text in &texts {
                    let Some(category) = parent_category(text) else {
                        continue;
                    };
                    let exists = job
                        .document
                        .children_named(container, "value")
                        .any(|value| job.document.text(value).trim() == category);
                    if exists {
                        continue;
                    }
                    let element = job.document.create_element("value", None);
                    job.document.set_text(element, category)?;
                    job.document.append_child(container, element)?;
                    debug!(tag = %tag, value = %text, category, "parent category added");
                    job.record(&mut outcome, Change::add(tag.as_str(), category));
                }
            }
        }
        Ok(outcome)
    }
}
