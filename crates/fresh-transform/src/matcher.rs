//! Row selection and value comparison.

use fresh_model::{Matching, Mode};

use crate::loader::RuleSet;
use crate::sanitize::{canonical_match_form, sanitize};
use crate::table::{Row, cell};

/// Rows that apply to a document: in `by_id` mode those whose id column
/// equals `document_id`, in `general` mode every row. An empty result is
/// not an error.
pub fn candidate_rows<'a>(rules: &'a RuleSet, document_id: &str) -> Vec<&'a Row> {
    let rows = rules.table().rows();
    match rules.mode() {
        Mode::General => rows.iter().collect(),
        Mode::ById => {
            let Some(column) = rules.spec().id_column() else {
                return Vec::new();
            };
            let wanted = document_id.trim();
            rows.iter()
                .filter(|row| cell(row, column).trim() == wanted)
                .collect()
        }
    }
}

/// Comparison key for table values against document text.
#[derive(Debug, Clone, Copy)]
pub struct ValueMatcher {
    matching: Matching,
}

impl ValueMatcher {
    pub fn new(matching: Matching) -> Self {
        Self { matching }
    }

    /// Key of an already sanitized value.
    pub fn key(&self, sanitized: &str) -> String {
        match self.matching {
            Matching::Canonical => canonical_match_form(sanitized),
            Matching::Exact => sanitized.to_string(),
        }
    }

    /// Key of a raw table cell.
    pub fn key_raw(&self, raw: &str) -> String {
        self.key(&sanitize(raw))
    }

    pub fn matches(&self, left: &str, right: &str) -> bool {
        self.key(left) == self.key(right)
    }
}
