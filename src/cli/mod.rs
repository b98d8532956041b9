//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    CheckCommand, DeleteCommand, ExportCommand, HistoryCommand, ListCommand, RunCommand, SaveCommand,
    ValidateCommand,
};
use std::ffi::OsString;

/// Build, validate and run typed AI data pipelines
#[derive(Debug, Parser, Clone)]
#[command(name = "snowflow")]
#[command(author = "Snowflow Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Build, validate and run typed AI data pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Base URL of the execution engine
    #[arg(long, global = true, env = "SNOWFLOW_ENGINE_URL")]
    pub engine_url: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline document against the engine
    Run(RunCommand),

    /// Pre-flight check a pipeline document
    Validate(ValidateCommand),

    /// Check whether one step type may connect to another
    Check(CheckCommand),

    /// Save a pipeline document to the local store
    Save(SaveCommand),

    /// List saved pipelines
    List(ListCommand),

    /// Export a saved pipeline to a document
    Export(ExportCommand),

    /// Delete a saved pipeline
    Delete(DeleteCommand),

    /// Show recent activity
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
