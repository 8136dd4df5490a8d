//! Declarative operation specifications.
//!
//! A specification is a JSON record stored next to its correspondence table:
//!
//! ```json
//! {
//!   "mode": "by_id",
//!   "file_id_column": "PEF_ID",
//!   "operations": [
//!     { "type": "update",
//!       "from": { "col": "old_title" },
//!       "to":   { "col": "new_title", "xpath": "Title" } }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// How table rows are matched against a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Rows whose id column equals the document identifier.
    ById,
    /// Every row, for every document.
    General,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::ById => "by_id",
            Mode::General => "general",
        })
    }
}

/// Comparison used when a table value is matched against document text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Matching {
    /// Entity-decoded, NFKC-normalized, quote-folded comparison.
    #[default]
    Canonical,
    /// Plain sanitized equality.
    Exact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    Add,
    Update,
    Delete,
    ReplaceSet,
    /// A type this engine does not implement. Kept so the operation can be
    /// reported and skipped instead of failing the whole specification.
    Unknown(String),
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::ReplaceSet => "replace_set",
            OperationKind::Unknown(raw) => raw,
        }
    }
}

impl From<String> for OperationKind {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "add" => OperationKind::Add,
            "update" => OperationKind::Update,
            "delete" => OperationKind::Delete,
            "replace_set" => OperationKind::ReplaceSet,
            _ => OperationKind::Unknown(raw),
        }
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side of an operation: a table column and/or a path query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    /// Whether created elements go into the enrichment namespace.
    #[serde(default, alias = "is_fresh", skip_serializing_if = "Option::is_none")]
    pub fresh: Option<bool>,
}

impl FieldRef {
    pub fn column(&self) -> Option<&str> {
        self.col.as_deref().filter(|col| !col.trim().is_empty())
    }

    pub fn path(&self) -> Option<&str> {
        self.xpath.as_deref().filter(|path| !path.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub from: FieldRef,
    #[serde(default)]
    pub to: FieldRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Operation {
    /// Fields an operation of this kind cannot run without.
    fn required_fields(&self) -> Vec<(&'static str, bool)> {
        match self.kind {
            OperationKind::Update => vec![
                ("from.col", self.from.column().is_some()),
                ("to.col", self.to.column().is_some()),
                ("to.xpath", self.to.path().is_some()),
            ],
            OperationKind::Add => vec![
                ("to.col", self.to.column().is_some()),
                ("to.xpath", self.to.path().is_some()),
            ],
            OperationKind::Delete => vec![("from.xpath", self.from.path().is_some())],
            OperationKind::ReplaceSet => vec![
                ("from.col", self.from.column().is_some()),
                ("from.xpath", self.from.path().is_some()),
                ("to.col", self.to.column().is_some()),
                ("to.xpath", self.to.path().is_some()),
            ],
            OperationKind::Unknown(_) => Vec::new(),
        }
    }
}

/// A parsed and validated operation specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub mode: Mode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id_column: Option<String>,
    #[serde(default)]
    pub matching: Matching,
    pub operations: Vec<Operation>,
}

impl OperationSpec {
    /// Parse and validate a specification from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let spec: OperationSpec = serde_json::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == Mode::ById && self.id_column().is_none() {
            return Err(ModelError::MissingIdColumn);
        }
        for (index, op) in self.operations.iter().enumerate() {
            if !op.enabled {
                continue;
            }
            if let Some((field, _)) = op
                .required_fields()
                .into_iter()
                .find(|(_, present)| !present)
            {
                return Err(ModelError::MissingField {
                    index,
                    kind: op.kind.to_string(),
                    field,
                });
            }
        }
        Ok(())
    }

    pub fn id_column(&self) -> Option<&str> {
        self.file_id_column
            .as_deref()
            .filter(|col| !col.trim().is_empty())
    }

    /// Operations that will run, in declared order.
    pub fn enabled_operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.enabled)
    }

    /// Every table column the enabled operations read, plus the id column
    /// in `by_id` mode.
    pub fn referenced_columns(&self) -> BTreeSet<&str> {
        let mut columns = BTreeSet::new();
        if self.mode == Mode::ById {
            columns.extend(self.id_column());
        }
        for op in self.enabled_operations() {
            columns.extend(op.from.column());
            columns.extend(op.to.column());
        }
        columns
    }
}
