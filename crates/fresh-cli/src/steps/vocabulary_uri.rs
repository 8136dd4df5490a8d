//! Attach controlled-vocabulary URIs to `value` elements.
//!
//! A vocabulary file is a CSV with exactly one `URI_<vocab>` column and one
//! label column per language. Each configured container tag is paired with
//! a label column; every `value` child of a matching container must carry a
//! label known to the vocabulary.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;
use fresh_model::Change;
use fresh_transform::decode_entities;
use fresh_xml::NodeId;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::config::StepKind;
use crate::pipeline::{DocumentJob, Step, StepContext, StepOutcome};

const URI_PREFIX: &str = "URI_";

/// Lookup key for labels: trimmed, NFC, lower-cased.
fn label_key(label: &str) -> String {
    label.trim().nfc().collect::<String>().to_lowercase()
}

/// Loaded vocabulary table.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    name: String,
    /// Vocabulary name taken from the `URI_<vocab>` header.
    vocab: String,
    headers: Vec<String>,
    rows: Vec<HashMap<String, String>>,
    uri_column: String,
}

impl Vocabulary {
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("open vocabulary {}", path.display()))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_csv(name, reader).with_context(|| format!("read vocabulary {}", path.display()))
    }

    pub fn from_reader<R: std::io::Read>(name: &str, reader: R) -> Result<Self> {
        let reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        Self::from_csv(name.to_string(), reader)
    }

    fn from_csv<R: std::io::Read>(name: String, mut reader: csv::Reader<R>) -> Result<Self> {
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|header| header.trim().trim_start_matches('\u{feff}').to_string())
            .collect();
        let uri_columns: Vec<&String> = headers
            .iter()
            .filter(|header| header.starts_with(URI_PREFIX))
            .collect();
        let [uri_column] = uri_columns.as_slice() else {
            bail!(
                "vocabulary {name} must have exactly one {URI_PREFIX}* column, found {}",
                uri_columns.len()
            );
        };
        let uri_column = (*uri_column).clone();
        let vocab = uri_column[URI_PREFIX.len()..].to_string();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: HashMap<String, String> = headers
                .iter()
                .enumerate()
                .map(|(idx, header)| {
                    let value = record.get(idx).unwrap_or_default().trim().to_string();
                    (header.clone(), value)
                })
                .collect();
            rows.push(row);
        }
        Ok(Self {
            name,
            vocab,
            headers,
            rows,
            uri_column,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vocab(&self) -> &str {
        &self.vocab
    }

    /// Label key → URI for one label column. Later rows win.
    pub fn labels(&self, column: &str) -> Result<HashMap<String, String>> {
        if !self.headers.iter().any(|header| header == column) {
            bail!("vocabulary {} has no column {column}", self.name);
        }
        let mut map = HashMap::new();
        for row in &self.rows {
            let label = row.get(column).map(String::as_str).unwrap_or_default();
            if label.is_empty() {
                continue;
            }
            let uri = row.get(&self.uri_column).cloned().unwrap_or_default();
            map.insert(label_key(label), uri);
        }
        Ok(map)
    }
}

pub struct VocabularyUri {
    vocabulary: Vocabulary,
    /// Container tag → label key → URI.
    fields: BTreeMap<String, HashMap<String, String>>,
}

impl VocabularyUri {
    /// Pair each container tag with its label column.
    pub fn new(vocabulary: Vocabulary, fields: BTreeMap<String, String>) -> Result<Self> {
        let mut lookups = BTreeMap::new();
        for (tag, column) in fields {
            let labels = vocabulary.labels(&column)?;
            lookups.insert(tag, labels);
        }
        Ok(Self {
            vocabulary,
            fields: lookups,
        })
    }
}

impl Step for VocabularyUri {
    fn kind(&self) -> StepKind {
        StepKind::VocabularyUri
    }

    fn run(&self, _ctx: &StepContext<'_>, job: &mut DocumentJob<'_>) -> Result<StepOutcome> {
        let mut outcome = StepOutcome::default();
        let vocab = self.vocabulary.vocab();
        for (tag, labels) in &self.fields {
            let doc = &job.document;
            let containers: Vec<NodeId> = doc
                .descendants(doc.root())
                .into_iter()
                .filter(|id| doc.local_name(*id) == tag.as_str())
                .collect();
            for container in containers {
                let values: Vec<NodeId> = job.document.children_named(container, "value").collect();
                for value in values {
                    let raw = decode_entities(&job.document.text(value));
                    let key = label_key(&raw);
                    if key.is_empty() {
                        continue;
                    }
                    let Some(uri) = labels.get(&key) else {
                        bail!(
                            "value '{}' in <{tag}> is not in vocabulary {}",
                            raw.trim(),
                            self.vocabulary.name()
                        );
                    };
                    if uri.is_empty() {
                        continue;
                    }
                    let already = job.document.attribute(value, "uri").as_deref() == Some(uri.as_str())
                        && job.document.attribute(value, "vocab").as_deref() == Some(vocab);
                    if already {
                        continue;
                    }
                    job.document.set_attribute(value, "uri", uri.as_str());
                    job.document.set_attribute(value, "vocab", vocab);
                    debug!(tag = %tag, label = %raw.trim(), uri = %uri, "vocabulary uri added");
                    job.record(
                        &mut outcome,
                        Change::add(
                            tag.as_str(),
                            format!("{} (uri={uri}, vocab={vocab})", raw.trim()),
                        ),
                    );
                }
            }
        }
        Ok(outcome)
    }
}
