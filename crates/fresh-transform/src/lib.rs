//! Rule-driven field transformations.
//!
//! A [`RuleSet`] pairs a correspondence table with the operation
//! specification stored next to it. A [`Transformer`] applies the rule set
//! to one document at a time, reporting every mutation to a
//! [`ChangeSink`](fresh_model::ChangeSink).

pub mod engine;
pub mod error;
pub mod hash;
pub mod loader;
pub mod matcher;
pub mod sanitize;
pub mod table;

pub use engine::{TransformStats, Transformer, value_nodes};
pub use error::{Result, RuleError};
pub use loader::{Provenance, RuleSet, spec_path_for};
pub use matcher::{ValueMatcher, candidate_rows};
pub use sanitize::{
    canonical_match_form, decode_entities, is_significant, normalize_path, sanitize,
    split_target_path,
};
pub use table::{CorrespondenceTable, Row, cell};
