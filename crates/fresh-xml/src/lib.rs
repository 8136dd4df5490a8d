//! Mutable XML document tree for metadata migration.
//!
//! Documents are parsed into a `xot` tree ([`Document`]), queried with
//! XPath through `xee-xpath` ([`XPath`]), mutated in place and written back
//! in a canonical two-space indented form.

pub mod document;
pub mod error;
mod parse;
pub mod query;
mod repair;
mod write;

pub use document::{Attribute, Document, NodeId, QualifiedName};
pub use error::{DocumentError, Result};
pub use query::XPath;
pub use repair::repair_bytes;
