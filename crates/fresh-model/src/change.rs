//! Change records and the sink that receives them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Old value written for `replace_set` records: the field was rebuilt from
/// scratch rather than edited in place.
pub const RESET_SENTINEL: &str = "(reset)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Add,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeAction::Add => "add",
            ChangeAction::Update => "update",
            ChangeAction::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single mutation, as emitted by a transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub action: ChangeAction,
    /// Path query or element name identifying the mutated field.
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

impl Change {
    pub fn add(field: impl Into<String>, new_value: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Add,
            field: field.into(),
            old_value: String::new(),
            new_value: new_value.into(),
        }
    }

    pub fn update(
        field: impl Into<String>,
        old_value: impl Into<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            action: ChangeAction::Update,
            field: field.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }

    pub fn delete(field: impl Into<String>, old_value: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Delete,
            field: field.into(),
            old_value: old_value.into(),
            new_value: String::new(),
        }
    }
}

/// A change stamped with the time and the task that made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub timestamp: String,
    pub task: String,
    pub action: ChangeAction,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
}

impl ChangeRecord {
    pub fn new(timestamp: impl Into<String>, task: impl Into<String>, change: Change) -> Self {
        Self {
            timestamp: timestamp.into(),
            task: task.into(),
            action: change.action,
            field: change.field,
            old_value: change.old_value,
            new_value: change.new_value,
        }
    }
}

/// Receives every mutation a transformation performs.
pub trait ChangeSink {
    fn record(&mut self, change: Change) -> Result<()>;
}

impl<S: ChangeSink + ?Sized> ChangeSink for &mut S {
    fn record(&mut self, change: Change) -> Result<()> {
        (**self).record(change)
    }
}

/// Sink that keeps changes in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub changes: Vec<Change>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn count(&self, action: ChangeAction) -> usize {
        self.changes
            .iter()
            .filter(|change| change.action == action)
            .count()
    }
}

impl ChangeSink for MemorySink {
    fn record(&mut self, change: Change) -> Result<()> {
        self.changes.push(change);
        Ok(())
    }
}
