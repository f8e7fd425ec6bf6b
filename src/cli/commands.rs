//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run build jobs until the build network is idle
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to build YAML file
    #[arg(short, long)]
    pub file: String,

    /// Job ids to start (defaults to every job nothing else triggers)
    #[arg(short, long)]
    pub job: Vec<String>,

    /// Don't save job runs to history
    #[arg(long)]
    pub no_history: bool,
}

/// Print the assembled pipelines without running them
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to build YAML file
    #[arg(short, long)]
    pub file: String,

    /// Only show this job id
    #[arg(short, long)]
    pub job: Option<String>,
}

/// Validate a build configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to build YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Move a built package into the repository's incoming queue
#[derive(Debug, Args, Clone)]
pub struct IncludeCommand {
    /// Package name
    pub package: String,

    /// Path of the .deb or .dsc to include
    pub path: PathBuf,

    /// Target distro, e.g. precise
    pub distro: String,

    /// Target architecture, e.g. amd64
    pub arch: String,

    /// Root of the incoming queue
    #[arg(long, default_value = "/var/www/packages/incoming/private")]
    pub incoming: PathBuf,
}

/// List registered builders and triggers
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Path to build YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show job run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Job id to filter by
    #[arg(short, long)]
    pub job: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details of a run
    #[arg(long)]
    pub details: bool,

    /// Show the latest run of every recorded job
    #[arg(long, conflicts_with = "job")]
    pub jobs: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run
    #[arg(long)]
    pub execution_id: Option<String>,

    /// Remove a run from the history
    #[arg(long, value_name = "EXECUTION_ID", conflicts_with_all = ["execution_id", "jobs"])]
    pub delete: Option<String>,
}
