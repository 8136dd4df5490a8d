use anyhow::Result;
use fresh_xml::{Document, NodeId};
use tracing::debug;

use crate::config::StepKind;
use crate::pipeline::{DocumentJob, Step, StepContext, StepOutcome};

/// Splits a bilingual document into one document per language.
///
/// Language-specific elements carry the language as a name suffix
/// (`TitreFR`, `TitleEN`). The output for a language drops every element
/// whose name ends with another configured suffix and keeps everything
/// else. Outputs are named `<id>-<language>.xml`, the language lower-cased.
pub struct SplitLanguages {
    languages: Vec<String>,
}

impl SplitLanguages {
    pub fn new(languages: Vec<String>) -> Self {
        Self { languages }
    }

    /// The suffix among `languages` that `name` carries, if any.
    fn language_of<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.languages
            .iter()
            .map(String::as_str)
            .find(|suffix| name.len() > suffix.len() && name.ends_with(suffix))
    }

    fn keep_only(&self, doc: &mut Document, language: &str) -> usize {
        let foreign: Vec<NodeId> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|id| {
                doc.is_element(*id)
                    && self
                        .language_of(doc.local_name(*id))
                        .is_some_and(|found| found != language)
            })
            .collect();
        // Descendants of an already removed element are detached with it.
        foreign
            .into_iter()
            .filter(|id| doc.is_attached(*id) && doc.remove(*id))
            .count()
    }
}

impl Step for SplitLanguages {
    fn kind(&self) -> StepKind {
        StepKind::SplitLanguages
    }

    fn run(&self, _ctx: &StepContext<'_>, job: &mut DocumentJob<'_>) -> Result<StepOutcome> {
        for language in &self.languages {
            let mut document = job.document.clone();
            let removed = self.keep_only(&mut document, language);
            let file_name = format!("{}-{}.xml", job.document_id, language.to_lowercase());
            debug!(language = %language, removed, output = %file_name, "language split");
            job.outputs.push((file_name, document));
        }
        Ok(StepOutcome::default())
    }
}
