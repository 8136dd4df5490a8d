use anyhow::Result;
use fresh_xml::repair_bytes;

use crate::config::StepKind;
use crate::pipeline::{DocumentJob, Step, StepContext, StepOutcome};

/// Repairs stray `&` and illegal control bytes so the export parses; the
/// runner then writes the document back in canonical form.
pub struct CorrectSpecialCharacters;

impl Step for CorrectSpecialCharacters {
    fn kind(&self) -> StepKind {
        StepKind::CorrectSpecialCharacters
    }

    fn prepare(&self, bytes: Vec<u8>) -> Vec<u8> {
        repair_bytes(&bytes)
    }

    fn run(&self, _ctx: &StepContext<'_>, _job: &mut DocumentJob<'_>) -> Result<StepOutcome> {
        Ok(StepOutcome::default())
    }
}
