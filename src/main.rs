use anyhow::{Context, Result};
use debpipe::cli::commands::{HistoryCommand, IncludeCommand, ListCommand, PlanCommand, RunCommand, ValidateCommand};
use debpipe::cli::output::*;
use debpipe::cli::{Cli, Command};
use debpipe::core::config::BuildConfig;
use debpipe::core::JobState;
use debpipe::execution::ExecutionEngine;
use debpipe::persistence::{create_summary, latest_per_job, ExecutionSummary, InMemoryPersistence, PersistenceBackend};
use debpipe::runner::{IncomingQueue, LocalRunner, LocalRunnerConfig};
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_jobs(cmd).await?,
        Command::Plan(cmd) => show_plan(cmd)?,
        Command::Validate(cmd) => validate_config(cmd)?,
        Command::Include(cmd) => include_package(cmd).await?,
        Command::List(cmd) => list_builders(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(debpipe::persistence::SqliteExecutionStore::with_default_path().await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_jobs(cmd: &RunCommand) -> Result<()> {
    let config = BuildConfig::from_file(&cmd.file).context("Failed to load build config")?;
    let registry = Arc::new(config.to_registry().context("Invalid build network")?);

    println!(
        "{} Loaded {} builders from {}",
        INFO,
        style(registry.len()).cyan(),
        style(&cmd.file).bold()
    );

    let jobs: Vec<String> = if cmd.job.is_empty() {
        registry.roots().into_iter().map(String::from).collect()
    } else {
        cmd.job.clone()
    };

    // Set up persistence
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_history().await?
    };

    let runner = LocalRunner::new(LocalRunnerConfig::from_settings(&config.settings));
    let mut engine = ExecutionEngine::new(registry.clone(), Arc::new(runner));

    // Set up event handler for console output
    engine.add_event_handler(|event| {
        if let Some(line) = format_execution_event(&event) {
            println!("{}", line);
        }
    });

    println!();
    let runs = engine.run_jobs(&jobs).await?;

    for run in &runs {
        let total_steps = registry
            .builder(&run.job_id)
            .map(|entry| entry.pipeline.steps().len())
            .unwrap_or_default();
        store.save_execution(&create_summary(run, total_steps)).await?;
    }
    if !cmd.no_history && !runs.is_empty() {
        println!("\n{} {} job runs saved to history", INFO, runs.len());
    }

    println!();
    for run in &runs {
        println!("{}", format_job_run(run));
    }

    let failed = runs.iter().filter(|run| run.status() == JobState::Failed).count();
    if failed > 0 {
        error!("{} of {} job runs failed", failed, runs.len());
        std::process::exit(1);
    }

    Ok(())
}

fn show_plan(cmd: &PlanCommand) -> Result<()> {
    let config = BuildConfig::from_file(&cmd.file).context("Failed to load build config")?;
    let registry = config.to_registry().context("Invalid build network")?;

    if let Some(job) = &cmd.job {
        if registry.builder(job).is_none() {
            anyhow::bail!("No builder named '{}'", job);
        }
    }

    for entry in registry.builders() {
        if cmd.job.as_ref().is_some_and(|job| job != &entry.job_id) {
            continue;
        }

        println!(
            "{} {} on [{}]",
            ROCKET,
            style(&entry.job_id).bold(),
            style(entry.workers.join(", ")).cyan()
        );
        for (key, value) in entry.pipeline.initial_properties() {
            println!("  {} = {}", style(key).cyan(), value);
        }
        for (index, step) in entry.pipeline.steps().iter().enumerate() {
            println!("{}", format_plan_step(index, step));
        }
        println!();
    }

    Ok(())
}

fn validate_config(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating build configuration...", INFO);

    let result = BuildConfig::from_file(&cmd.file)
        .and_then(|config| config.to_registry().map(|registry| (config, registry)));

    match result {
        Ok((config, registry)) => {
            println!("{} Build configuration is valid!", CHECK);
            println!("  Jobs: {}", style(config.jobs.len()).cyan());
            println!("  Builders: {}", style(registry.len()).cyan());
            println!("  Triggers: {}", style(registry.graph().triggers().count()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn include_package(cmd: &IncludeCommand) -> Result<()> {
    let queue = IncomingQueue::new(&cmd.incoming);
    let dest = queue
        .include(&cmd.package, &cmd.path, &cmd.distro, &cmd.arch)
        .await
        .with_context(|| format!("Failed to include {}", cmd.path.display()))?;

    println!(
        "{} {} queued as {}",
        CHECK,
        style(&cmd.package).bold(),
        style(dest.display()).dim()
    );
    Ok(())
}

fn list_builders(cmd: &ListCommand) -> Result<()> {
    let config = BuildConfig::from_file(&cmd.file).context("Failed to load build config")?;
    let registry = config.to_registry().context("Invalid build network")?;

    if cmd.json {
        let builders: Vec<_> = registry
            .builders()
            .map(|entry| {
                serde_json::json!({
                    "name": entry.job_id,
                    "workers": entry.workers,
                    "steps": entry.pipeline.steps().len(),
                    "downstream": registry.downstream(&entry.job_id),
                })
            })
            .collect();
        let triggers: Vec<_> = registry
            .graph()
            .triggers()
            .map(|(name, targets)| serde_json::json!({ "name": name, "builders": targets }))
            .collect();
        let data = serde_json::json!({ "builders": builders, "triggers": triggers });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    println!("{} Builders:", INFO);
    for entry in registry.builders() {
        let downstream = registry.downstream(&entry.job_id);
        if downstream.is_empty() {
            println!("  {}", style(&entry.job_id).bold());
        } else {
            println!(
                "  {} -> {}",
                style(&entry.job_id).bold(),
                style(downstream.join(", ")).cyan()
            );
        }
    }

    println!("{} Triggers:", INFO);
    for (name, targets) in registry.graph().triggers() {
        println!("  {} -> {}", style(name).bold(), targets.join(", "));
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history().await?;

    // If specific execution ID is requested
    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id = uuid::Uuid::parse_str(exec_id_str)
            .context("Invalid execution ID format")?;

        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.details)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    if let Some(exec_id_str) = &cmd.delete {
        let exec_id = uuid::Uuid::parse_str(exec_id_str)
            .context("Invalid execution ID format")?;

        match store.load_execution(exec_id).await? {
            Some(summary) => {
                store.delete_execution(exec_id).await?;
                println!(
                    "{} Removed run {} of {}",
                    CHECK,
                    style(exec_id).cyan(),
                    style(&summary.job_name).bold()
                );
            }
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    let executions = match &cmd.job {
        None if cmd.jobs => latest_per_job(store.as_ref()).await?,
        Some(job) => {
            let mut runs = store.list_executions(job).await?;
            runs.truncate(cmd.limit);
            runs
        }
        None => store.recent_executions(cmd.limit).await?,
    };

    if executions.is_empty() {
        println!("{} No job runs found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        if cmd.jobs {
            println!("{} Latest run of {} jobs:", INFO, executions.len());
        } else {
            println!("{} Job run history (showing latest {}):", INFO, cmd.limit);
        }
        for summary in &executions {
            println!("  {}", format_execution_summary(summary));
        }
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary, details: bool) -> Result<()> {
    println!("{} Job Run Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Job: {}", style(&summary.job_name).bold());
    println!("  Worker: {}", style(&summary.worker).cyan());
    println!("  Status: {}", format_job_state(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!("  Steps: {}/{}", summary.completed_steps, summary.total_steps);
    if let Some(step) = &summary.failed_step {
        println!("  Failed at: {}", style(step).red());
    }

    if details {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
