//! Error types for rule loading and application.

use std::path::PathBuf;

use fresh_model::ModelError;
use fresh_xml::DocumentError;
use thiserror::Error;

/// Errors raised while loading or applying a rule set.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuleError {
    /// Correspondence table not found.
    #[error("correspondence table not found: {path}")]
    TableNotFound { path: PathBuf },

    /// Operation specification not found.
    #[error("operation specification not found: {path}")]
    SpecNotFound { path: PathBuf },

    /// Reading a resource from disk failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read or parse a CSV table.
    #[error("failed to read CSV {path}: {source}")]
    CsvRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The operation specification is malformed.
    #[error("invalid operation specification {path}: {source}")]
    InvalidSpec {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    /// The table lacks columns the specification references.
    #[error("table {table} is missing columns: {}", columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    /// An XPath in the specification cannot be compiled or evaluated.
    #[error("operation {index}: {source}")]
    InvalidPath {
        index: usize,
        #[source]
        source: DocumentError,
    },

    /// A write target has no usable element name.
    #[error("operation {index}: cannot derive an element name from '{path}'")]
    InvalidTarget { index: usize, path: String },

    /// The document rejected an edit.
    #[error("document edit failed: {0}")]
    Edit(#[from] DocumentError),

    /// The change sink rejected a record.
    #[error(transparent)]
    Sink(#[from] ModelError),
}

/// Result type for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
