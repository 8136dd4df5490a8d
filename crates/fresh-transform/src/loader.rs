//! Loading a correspondence table together with its operation specification.

use std::fs;
use std::path::{Path, PathBuf};

use fresh_model::{Mode, OperationKind, OperationSpec};
use fresh_xml::XPath;
use tracing::debug;

use crate::error::{Result, RuleError};
use crate::hash::sha256_hex;
use crate::sanitize::{normalize_path, split_target_path};
use crate::table::CorrespondenceTable;

/// Where a rule set came from and what exactly was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub table_path: PathBuf,
    pub spec_path: PathBuf,
    pub table_sha256: String,
    pub spec_sha256: String,
}

/// A path as written in the specification (after normalization) and its
/// validated XPath form.
#[derive(Debug, Clone)]
pub(crate) struct CompiledPath {
    pub(crate) text: String,
    pub(crate) query: XPath,
}

#[derive(Debug, Clone)]
pub(crate) enum Plan {
    Update {
        from_col: String,
        to_col: String,
        target: CompiledPath,
    },
    Add {
        to_col: String,
        parent: CompiledPath,
        tag: String,
        field: String,
        fresh: bool,
    },
    Delete {
        from_col: Option<String>,
        source: CompiledPath,
    },
    ReplaceSet {
        from_col: String,
        to_col: String,
        source: CompiledPath,
        target: CompiledPath,
        fresh: bool,
    },
    Unknown {
        kind: String,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledOperation {
    pub(crate) index: usize,
    pub(crate) plan: Plan,
}

/// A correspondence table, its specification and the compiled operations.
#[derive(Debug, Clone)]
pub struct RuleSet {
    table: CorrespondenceTable,
    spec: OperationSpec,
    operations: Vec<CompiledOperation>,
    provenance: Option<Provenance>,
}

/// Specification path for a table: `<specs_dir>/<table stem>.json`.
pub fn spec_path_for(specs_dir: &Path, table_name: &str) -> PathBuf {
    let stem = Path::new(table_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| table_name.to_string());
    specs_dir.join(format!("{stem}.json"))
}

impl RuleSet {
    /// Load `table_name` from `tables_dir` and its specification from
    /// `specs_dir`.
    pub fn load(tables_dir: &Path, specs_dir: &Path, table_name: &str) -> Result<Self> {
        let table_path = tables_dir.join(table_name);
        let spec_path = spec_path_for(specs_dir, table_name);
        Self::from_files(&table_path, &spec_path)
    }

    /// Load a rule set from explicit file paths.
    pub fn from_files(table_path: &Path, spec_path: &Path) -> Result<Self> {
        if !spec_path.is_file() {
            return Err(RuleError::SpecNotFound {
                path: spec_path.to_path_buf(),
            });
        }
        let spec_bytes = fs::read(spec_path).map_err(|source| RuleError::Io {
            path: spec_path.to_path_buf(),
            source,
        })?;
        let spec_text = String::from_utf8_lossy(&spec_bytes);
        let spec = OperationSpec::from_json(&spec_text).map_err(|source| RuleError::InvalidSpec {
            path: spec_path.to_path_buf(),
            source,
        })?;

        let table = CorrespondenceTable::from_path(table_path)?;
        let table_bytes = fs::read(table_path).map_err(|source| RuleError::Io {
            path: table_path.to_path_buf(),
            source,
        })?;

        let provenance = Provenance {
            table_path: table_path.to_path_buf(),
            spec_path: spec_path.to_path_buf(),
            table_sha256: sha256_hex(&table_bytes),
            spec_sha256: sha256_hex(&spec_bytes),
        };
        debug!(
            table = %provenance.table_path.display(),
            spec = %provenance.spec_path.display(),
            table_sha256 = %provenance.table_sha256,
            spec_sha256 = %provenance.spec_sha256,
            rows = table.len(),
            "rule set loaded"
        );

        let mut rules = Self::new(table, spec)?;
        rules.provenance = Some(provenance);
        Ok(rules)
    }

    /// Build a rule set from already loaded parts. Fails when the table lacks
    /// a referenced column or a path cannot be parsed.
    pub fn new(table: CorrespondenceTable, spec: OperationSpec) -> Result<Self> {
        spec.validate().map_err(|source| RuleError::InvalidSpec {
            path: PathBuf::from(table.name()),
            source,
        })?;
        let missing = table.missing_columns(spec.referenced_columns());
        if !missing.is_empty() {
            return Err(RuleError::MissingColumns {
                table: table.name().to_string(),
                columns: missing,
            });
        }
        let operations = compile(&spec)?;
        Ok(Self {
            table,
            spec,
            operations,
            provenance: None,
        })
    }

    pub fn table(&self) -> &CorrespondenceTable {
        &self.table
    }

    pub fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    pub fn mode(&self) -> Mode {
        self.spec.mode
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    /// Number of enabled operations.
    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    pub(crate) fn operations(&self) -> &[CompiledOperation] {
        &self.operations
    }
}

fn compile_path(index: usize, raw: &str) -> Result<CompiledPath> {
    let text = normalize_path(raw);
    let query = XPath::parse(&text).map_err(|source| RuleError::InvalidPath { index, source })?;
    Ok(CompiledPath { text, query })
}

fn column(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn compile(spec: &OperationSpec) -> Result<Vec<CompiledOperation>> {
    let mut compiled = Vec::new();
    for (index, op) in spec.operations.iter().enumerate() {
        if !op.enabled {
            continue;
        }
        let from_path = op.from.path().unwrap_or_default();
        let to_path = op.to.path().unwrap_or_default();
        let plan = match &op.kind {
            OperationKind::Update => Plan::Update {
                from_col: column(op.from.column()),
                to_col: column(op.to.column()),
                target: compile_path(index, to_path)?,
            },
            OperationKind::Add => {
                let (parent, tag) =
                    split_target_path(to_path).ok_or_else(|| RuleError::InvalidTarget {
                        index,
                        path: to_path.to_string(),
                    })?;
                Plan::Add {
                    to_col: column(op.to.column()),
                    parent: compile_path(index, &parent)?,
                    tag,
                    field: normalize_path(to_path).trim_end_matches('/').to_string(),
                    fresh: op.to.fresh.unwrap_or(true),
                }
            }
            OperationKind::Delete => Plan::Delete {
                from_col: op.from.column().map(str::to_string),
                source: compile_path(index, from_path)?,
            },
            OperationKind::ReplaceSet => Plan::ReplaceSet {
                from_col: column(op.from.column()),
                to_col: column(op.to.column()),
                source: compile_path(index, from_path)?,
                target: compile_path(index, to_path)?,
                fresh: op.to.fresh.unwrap_or(false),
            },
            OperationKind::Unknown(kind) => Plan::Unknown { kind: kind.clone() },
        };
        compiled.push(CompiledOperation { index, plan });
    }
    Ok(compiled)
}
