//! Error types for document parsing, querying and serialization.

use thiserror::Error;

/// Errors raised by the document tree.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The input is not well-formed XML.
    #[error("malformed document: {message}")]
    Parse { message: String },

    /// The input is not valid UTF-8.
    #[error("document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The input has no root element.
    #[error("document has no root element")]
    Empty,

    /// The XPath expression could not be compiled or evaluated.
    #[error("invalid XPath '{query}': {reason}")]
    Query { query: String, reason: String },

    /// A tree edit was rejected.
    #[error("cannot modify document: {message}")]
    Mutation { message: String },

    /// Writing the serialized form failed.
    #[error("failed to serialize document: {message}")]
    Serialize { message: String },
}

impl DocumentError {
    pub(crate) fn mutation(err: impl std::fmt::Display) -> Self {
        Self::Mutation {
            message: err.to_string(),
        }
    }

    pub(crate) fn serialize(err: impl std::fmt::Display) -> Self {
        Self::Serialize {
            message: err.to_string(),
        }
    }
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
