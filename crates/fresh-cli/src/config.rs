//! Pipeline configuration file.
//!
//! ```toml
//! [folders]
//! input = "files/input"
//! runs = "runs"
//!
//! [[steps]]
//! kind = "correct_special_characters"
//!
//! [[steps]]
//! name = "update_regions"
//! kind = "rules"
//! tables = ["regles-migration-regions.csv"]
//! ```
//!
//! Relative folders resolve against the directory holding the file.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Config file used when neither `--config` nor `FRESH_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "configs/pipeline.toml";

/// Working folders of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Folders {
    /// Documents to migrate.
    pub input: PathBuf,
    /// Parent of the per-run output folders.
    pub runs: PathBuf,
    /// Correspondence tables (CSV).
    pub tables: PathBuf,
    /// Operation specifications (JSON), one per table.
    pub specs: PathBuf,
    /// Controlled vocabularies (CSV).
    pub vocabularies: PathBuf,
}

impl Default for Folders {
    fn default() -> Self {
        Self {
            input: PathBuf::from("files/input"),
            runs: PathBuf::from("runs"),
            tables: PathBuf::from("files/conversion-tables"),
            specs: PathBuf::from("configs/rules"),
            vocabularies: PathBuf::from("files/vocabularies"),
        }
    }
}

impl Folders {
    /// Resolve relative folders against `base`.
    #[must_use]
    pub fn resolved_against(self, base: &Path) -> Self {
        let resolve = |path: PathBuf| {
            if path.is_absolute() {
                path
            } else {
                base.join(path)
            }
        };
        Self {
            input: resolve(self.input),
            runs: resolve(self.runs),
            tables: resolve(self.tables),
            specs: resolve(self.specs),
            vocabularies: resolve(self.vocabularies),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    CorrectSpecialCharacters,
    Rules,
    VocabularyUri,
    AddConstant,
    AddParentCategory,
    RemoveDuplicateEmpty,
    CodeUri,
    SplitLanguages,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::CorrectSpecialCharacters => "correct_special_characters",
            StepKind::Rules => "rules",
            StepKind::VocabularyUri => "vocabulary_uri",
            StepKind::AddConstant => "add_constant",
            StepKind::AddParentCategory => "add_parent_category",
            StepKind::RemoveDuplicateEmpty => "remove_duplicate_empty",
            StepKind::CodeUri => "code_uri",
            StepKind::SplitLanguages => "split_languages",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-value element appended by an `add_constant` step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstantField {
    pub tag: String,
    pub value: String,
    /// Qualify the element into the enrichment namespace.
    #[serde(default = "default_true")]
    pub fresh: bool,
}

/// Remote code-to-URI service queried by a `code_uri` step. Client
/// credentials are read from the named environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodeServiceConfig {
    /// OAuth2 token endpoint (client-credentials grant).
    pub token_endpoint: String,
    /// Lookup endpoint; the code is passed as `searchText`.
    #[serde(default = "default_lookup_url")]
    pub lookup_url: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_client_id_env")]
    pub client_id_env: String,
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_lookup_url() -> String {
    "https://id.who.int/icd/entity/autocode".to_string()
}

fn default_scope() -> String {
    "icdapi_access".to_string()
}

fn default_client_id_env() -> String {
    "ICD_CLIENT_ID".to_string()
}

fn default_client_secret_env() -> String {
    "ICD_CLIENT_SECRET".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Language suffixes used by `split_languages` when none are configured.
pub const DEFAULT_LANGUAGES: [&str; 2] = ["FR", "EN"];

/// One `[[steps]]` entry. Parameters that a kind does not use are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub kind: StepKind,
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `rules`: correspondence tables applied in order.
    #[serde(default)]
    pub tables: Vec<String>,
    /// `add_parent_category`: container tags to scan. `code_uri`: elements
    /// holding codes, prefixed names allowed.
    #[serde(default)]
    pub tags: Vec<String>,
    /// `vocabulary_uri`: vocabulary file name.
    pub vocabulary: Option<String>,
    /// `vocabulary_uri`: container tag → label column.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// `add_constant`: elements to append under the root.
    #[serde(default)]
    pub constants: Vec<ConstantField>,
    /// `code_uri`: lookup service.
    pub service: Option<CodeServiceConfig>,
    /// `split_languages`: element-name suffixes, one output per entry.
    #[serde(default)]
    pub languages: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl StepConfig {
    /// Display name; defaults to the kind.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.as_str())
    }

    /// Language suffixes for `split_languages`.
    pub fn languages(&self) -> Vec<String> {
        if self.languages.is_empty() {
            DEFAULT_LANGUAGES.iter().map(ToString::to_string).collect()
        } else {
            self.languages.clone()
        }
    }

    /// Check that the parameters the kind needs are present.
    pub fn validate(&self) -> Result<()> {
        let name = self.name();
        match self.kind {
            StepKind::Rules if self.tables.is_empty() => {
                bail!("step '{name}' lists no tables")
            }
            StepKind::VocabularyUri if self.vocabulary.is_none() => {
                bail!("step '{name}' names no vocabulary")
            }
            StepKind::VocabularyUri if self.fields.is_empty() => {
                bail!("step '{name}' maps no fields")
            }
            StepKind::AddConstant if self.constants.is_empty() => {
                bail!("step '{name}' defines no constants")
            }
            StepKind::AddParentCategory | StepKind::CodeUri if self.tags.is_empty() => {
                bail!("step '{name}' lists no tags")
            }
            StepKind::CodeUri if self.service.is_none() => {
                bail!("step '{name}' configures no service")
            }
            StepKind::SplitLanguages if self.languages.len() == 1 => {
                bail!("step '{name}' needs at least two languages")
            }
            StepKind::SplitLanguages
                if self
                    .languages
                    .iter()
                    .any(|language| language.trim().is_empty()) =>
            {
                bail!("step '{name}' has a blank language")
            }
            _ => Ok(()),
        }
    }
}

/// Parsed pipeline file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub folders: Folders,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl PipelineConfig {
    /// Read and validate a pipeline file, resolving its folders.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("parse config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self {
            folders: config.folders.resolved_against(base),
            steps: config.steps,
        })
    }

    /// Parse and validate pipeline TOML; folders are left as written.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        for step in &config.steps {
            step.validate()?;
        }
        Ok(config)
    }

    /// Steps that will run, in order.
    pub fn enabled_steps(&self) -> impl Iterator<Item = &StepConfig> {
        self.steps.iter().filter(|step| step.enabled)
    }
}
