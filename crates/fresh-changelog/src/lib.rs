//! Per-document change logs.

pub mod error;
pub mod recorder;

pub use error::{ChangelogError, Result};
pub use recorder::ChangeRecorder;
