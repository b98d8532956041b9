//! CLI command definitions

use crate::core::StepType;
use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline JSON document
    #[arg(short, long)]
    pub file: String,

    /// Question to ask the pipeline
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Use the blocking endpoint instead of streaming progress
    #[arg(long)]
    pub blocking: bool,

    /// Pause between a step turning active and completed, in milliseconds
    #[arg(long, default_value_t = 500)]
    pub settle_ms: u64,

    /// Don't record the run in history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a pipeline document
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline JSON document
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Check a connection between two step types
#[derive(Debug, Args, Clone)]
pub struct CheckCommand {
    /// Source step type (e.g. snowflakeSource)
    pub source: StepType,

    /// Target step type (e.g. agent)
    pub target: StepType,
}

/// Save a pipeline document
#[derive(Debug, Args, Clone)]
pub struct SaveCommand {
    /// Path to pipeline JSON document
    #[arg(short, long)]
    pub file: String,

    /// Name to save under (defaults to the document's name)
    #[arg(short, long)]
    pub name: Option<String>,
}

/// List saved pipelines
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Export a saved pipeline
#[derive(Debug, Args, Clone)]
pub struct ExportCommand {
    /// Saved pipeline name
    #[arg(short, long)]
    pub name: String,

    /// Output path
    #[arg(short, long)]
    pub out: String,
}

/// Delete a saved pipeline
#[derive(Debug, Args, Clone)]
pub struct DeleteCommand {
    /// Saved pipeline name
    #[arg(short, long)]
    pub name: String,
}

/// Show recent activity
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Number of recent events to show
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
