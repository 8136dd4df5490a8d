use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid operation specification: {0}")]
    Spec(#[from] serde_json::Error),
    #[error("operation specification uses mode 'by_id' without a file_id_column")]
    MissingIdColumn,
    #[error("operation {index} ({kind}) is missing '{field}'")]
    MissingField {
        index: usize,
        kind: String,
        field: &'static str,
    },
    #[error("failed to record change: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, ModelError>;
