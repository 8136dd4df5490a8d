//! Pipeline step implementations.

mod add_constant;
mod add_parent_category;
mod code_uri;
mod correct_special_characters;
mod remove_duplicate_empty;
mod rules;
mod split_languages;
mod vocabulary_uri;

use anyhow::{Context, Result};

use crate::code_service::{HttpCodeResolver, ServiceSettings};
use crate::config::{Folders, StepConfig, StepKind};
use crate::pipeline::Step;

pub use add_constant::AddConstant;
pub use add_parent_category::AddParentCategory;
pub use code_uri::CodeUri;
pub use correct_special_characters::CorrectSpecialCharacters;
pub use remove_duplicate_empty::RemoveDuplicateEmpty;
pub use rules::RulesStep;
pub use split_languages::SplitLanguages;
pub use vocabulary_uri::{Vocabulary, VocabularyUri};

/// Build the step described by `config`, loading its resources from
/// `folders`.
pub fn build(config: &StepConfig, folders: &Folders) -> Result<Box<dyn Step>> {
    config.validate()?;
    let step: Box<dyn Step> = match config.kind {
        StepKind::CorrectSpecialCharacters => Box::new(CorrectSpecialCharacters),
        StepKind::Rules => Box::new(RulesStep::load(folders, &config.tables)?),
        StepKind::VocabularyUri => {
            let file = config
                .vocabulary
                .as_deref()
                .context("vocabulary file not set")?;
            let vocabulary = Vocabulary::from_path(&folders.vocabularies.join(file))?;
            Box::new(VocabularyUri::new(vocabulary, config.fields.clone())?)
        }
        StepKind::AddConstant => Box::new(AddConstant::new(config.constants.clone())),
        StepKind::AddParentCategory => Box::new(AddParentCategory::new(config.tags.clone())),
        StepKind::RemoveDuplicateEmpty => Box::new(RemoveDuplicateEmpty),
        StepKind::CodeUri => {
            let service = config.service.as_ref().context("code service not set")?;
            let resolver = HttpCodeResolver::new(ServiceSettings::from_config(service)?)?;
            Box::new(CodeUri::new(resolver, &config.tags)?)
        }
        StepKind::SplitLanguages => Box::new(SplitLanguages::new(config.languages())),
    };
    Ok(step)
}
