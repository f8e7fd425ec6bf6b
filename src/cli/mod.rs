//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, IncludeCommand, ListCommand, PlanCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Debian package build pipelines for ROS releases
#[derive(Debug, Parser, Clone)]
#[command(name = "debpipe")]
#[command(version)]
#[command(about = "Builds Debian packages from ROS release repositories", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run build jobs
    Run(RunCommand),

    /// Show the steps of every assembled pipeline
    Plan(PlanCommand),

    /// Validate a build configuration
    Validate(ValidateCommand),

    /// Move a package into the incoming queue
    Include(IncludeCommand),

    /// List builders and triggers
    List(ListCommand),

    /// Show job run history
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
