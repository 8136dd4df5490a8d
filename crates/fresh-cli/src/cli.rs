//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use fresh_cli::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(
    name = "fresh-migrate",
    version,
    about = "Migrate study metadata documents with correspondence tables",
    long_about = "Migrate XML study metadata documents to the enriched schema.\n\n\
                  Each pipeline step rewrites every document, applying correspondence\n\
                  tables, vocabularies and cleanups, and records every change in a\n\
                  per-document change log."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pipeline configuration file.
    #[arg(
        long,
        value_name = "PATH",
        env = "FRESH_CONFIG",
        default_value = DEFAULT_CONFIG_PATH,
        global = true
    )]
    pub config: PathBuf,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every enabled step over the input folder.
    Run(RunArgs),

    /// Apply one correspondence table to one document.
    Transform(TransformArgs),

    /// Load rule sets and report what they contain.
    Check(CheckArgs),

    /// List the configured steps.
    Steps,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Input folder (default: `folders.input` from the config).
    #[arg(long = "input", value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Parent folder for run outputs (default: `folders.runs`).
    #[arg(long = "runs-dir", value_name = "DIR")]
    pub runs_dir: Option<PathBuf>,
}

/// Where tables and operation specifications are looked up.
#[derive(Parser)]
pub struct RuleFolderArgs {
    /// Folder holding correspondence tables (default: `folders.tables`).
    #[arg(long = "tables-dir", value_name = "DIR")]
    pub tables_dir: Option<PathBuf>,

    /// Folder holding operation specifications (default: `folders.specs`).
    #[arg(long = "specs-dir", value_name = "DIR")]
    pub specs_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub struct TransformArgs {
    /// Document to transform.
    #[arg(value_name = "DOCUMENT")]
    pub document: PathBuf,

    /// Correspondence table file name.
    #[arg(long = "table", value_name = "NAME")]
    pub table: String,

    /// Where to write the transformed document.
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: PathBuf,

    /// Write `<stem>.log` and `<stem>.csv` change logs into this folder.
    #[arg(long = "changelog-dir", value_name = "DIR")]
    pub changelog_dir: Option<PathBuf>,

    #[command(flatten)]
    pub folders: RuleFolderArgs,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Correspondence table file names (default: every table used by a
    /// `rules` step).
    #[arg(value_name = "TABLE")]
    pub tables: Vec<String>,

    #[command(flatten)]
    pub folders: RuleFolderArgs,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
