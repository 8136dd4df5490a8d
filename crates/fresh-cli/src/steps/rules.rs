use anyhow::{Context, Result};
use fresh_transform::{RuleSet, TransformStats, Transformer};
use tracing::{debug, info};

use crate::config::{Folders, StepKind};
use crate::pipeline::{DocumentJob, Step, StepContext, StepOutcome};

/// Applies correspondence-table rule sets in order.
pub struct RulesStep {
    rule_sets: Vec<RuleSet>,
}

impl RulesStep {
    pub fn new(rule_sets: Vec<RuleSet>) -> Self {
        Self { rule_sets }
    }

    /// Load each table together with its operation specification.
    pub fn load(folders: &Folders, tables: &[String]) -> Result<Self> {
        let mut rule_sets = Vec::with_capacity(tables.len());
        for table in tables {
            let rules = RuleSet::load(&folders.tables, &folders.specs, table)
                .with_context(|| format!("load rules for {table}"))?;
            info!(
                table = %table,
                mode = %rules.mode(),
                operations = rules.operation_count(),
                rows = rules.table().len(),
                "rule set loaded"
            );
            rule_sets.push(rules);
        }
        Ok(Self::new(rule_sets))
    }
}

impl Step for RulesStep {
    fn kind(&self) -> StepKind {
        StepKind::Rules
    }

    fn run(&self, _ctx: &StepContext<'_>, job: &mut DocumentJob<'_>) -> Result<StepOutcome> {
        let mut total = TransformStats::default();
        for rules in &self.rule_sets {
            let stats = Transformer::new(rules)
                .apply(&mut job.document, &job.document_id, &mut job.changes)
                .with_context(|| format!("apply {}", rules.table().name()))?;
            debug!(
                table = rules.table().name(),
                attempts = stats.attempts,
                applied = stats.applied,
                skipped = stats.skipped,
                "rule set applied"
            );
            total.merge(&stats);
        }
        Ok(StepOutcome::from_stats(&total))
    }
}
