use std::collections::HashMap;

use anyhow::{Context, Result};
use fresh_model::{Change, FRESH_NS, FRESH_PREFIX};
use fresh_transform::{decode_entities, normalize_path, sanitize};
use fresh_xml::XPath;
use tracing::debug;

use crate::code_service::CodeResolver;
use crate::config::StepKind;
use crate::pipeline::{DocumentJob, Step, StepContext, StepOutcome};

/// Replaces classification codes held by the configured elements with the
/// URI a [`CodeResolver`] returns. Elements already holding a URI and codes
/// without a match are left alone.
pub struct CodeUri<R> {
    resolver: R,
    fields: Vec<(String, XPath)>,
    prefixes: HashMap<String, String>,
}

impl<R: CodeResolver> CodeUri<R> {
    pub fn new(resolver: R, tags: &[String]) -> Result<Self> {
        let fields = tags
            .iter()
            .map(|tag| {
                let query = XPath::parse(&normalize_path(tag))
                    .with_context(|| format!("invalid code element '{tag}'"))?;
                Ok((tag.clone(), query))
            })
            .collect::<Result<Vec<_>>>()?;
        let prefixes = HashMap::from([(FRESH_PREFIX.to_string(), FRESH_NS.to_string())]);
        Ok(Self {
            resolver,
            fields,
            prefixes,
        })
    }
}

fn is_uri(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

impl<R: CodeResolver> Step for CodeUri<R> {
    fn kind(&self) -> StepKind {
        StepKind::CodeUri
    }

    fn run(&self, _ctx: &StepContext<'_>, job: &mut DocumentJob<'_>) -> Result<StepOutcome> {
        let mut outcome = StepOutcome::default();
        for (field, query) in &self.fields {
            let nodes = job.document.select_xpath(query, &self.prefixes)?;
            for node in nodes {
                let code = decode_entities(&job.document.text(node)).trim().to_string();
                if code.is_empty() || is_uri(&code) {
                    continue;
                }
                let Some(uri) = self.resolver.resolve(&code)? else {
                    debug!(field = %field, code = %code, "code left unresolved");
                    continue;
                };
                job.document.set_text(node, &sanitize(&uri))?;
                debug!(field = %field, code = %code, uri = %uri, "code replaced");
                job.record(&mut outcome, Change::update(field.as_str(), code, uri));
            }
        }
        Ok(outcome)
    }
}
