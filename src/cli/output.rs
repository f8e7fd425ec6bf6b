//! CLI output formatting

use crate::{
    core::{JobState, Step, StepRecord, StepStatus},
    execution::{ExecutionEvent, JobRun},
    persistence::ExecutionSummary,
};
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Format a job state for display
pub fn format_job_state(state: JobState) -> String {
    match state {
        JobState::Registered => style("REGISTERED").dim().to_string(),
        JobState::Queued => style("QUEUED").blue().to_string(),
        JobState::Running => style("RUNNING").yellow().to_string(),
        JobState::Completed => style("COMPLETED").green().to_string(),
        JobState::Failed => style("FAILED").red().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a run summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        JobState::Completed => CHECK,
        JobState::Failed => CROSS,
        JobState::Running | JobState::Queued => SPINNER,
        JobState::Registered => INFO,
    };

    let failed = summary
        .failed_step
        .as_ref()
        .map(|step| format!(" at {}", style(step).red()))
        .unwrap_or_default();

    format!(
        "{} {} - {} on {} - {} ({}/{}){}",
        status_icon,
        style(short_id(&summary.execution_id)).dim(),
        style(&summary.job_name).bold(),
        style(&summary.worker).cyan(),
        format_job_state(summary.status),
        summary.completed_steps,
        summary.total_steps,
        failed
    )
}

/// Format a finished step
pub fn format_step_record(record: &StepRecord) -> String {
    let label = record.description_done.as_deref().unwrap_or(&record.name);
    match &record.status {
        StepStatus::Succeeded { .. } => format!("{} {}", CHECK, style(label).green()),
        StepStatus::Failed { error } if record.halt_on_failure => {
            format!("{} {}: {}", CROSS, style(&record.name).red(), style(format_output(error, 5)).dim())
        }
        StepStatus::Failed { error } => format!(
            "{} {} (continuing): {}",
            WARN,
            style(&record.name).yellow(),
            style(format_output(error, 5)).dim()
        ),
    }
}

/// Format an execution event for display.
///
/// Returns `None` for events that stay quiet, such as hidden successful steps.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::JobQueued { job, trigger } => format!(
            "{} {} queued by {}",
            INFO,
            style(job).bold(),
            style(trigger).dim()
        ),
        ExecutionEvent::TriggerIgnored { job, trigger, state } => format!(
            "{} {} ignored {} ({})",
            WARN,
            style(job).yellow(),
            style(trigger).dim(),
            format_job_state(*state)
        ),
        ExecutionEvent::JobStarted {
            execution_id,
            job,
            worker,
        } => format!(
            "{} Starting {} on {} ({})",
            ROCKET,
            style(job).bold(),
            style(worker).cyan(),
            style(short_id(execution_id)).dim()
        ),
        ExecutionEvent::StepFinished { record, .. } => {
            if record.hidden {
                return None;
            }
            format!("  {}", format_step_record(record))
        }
        ExecutionEvent::JobFinished {
            execution_id,
            job,
            status,
            failed_step,
        } => {
            let status_str = match (status, failed_step) {
                (JobState::Completed, _) => format!("completed {}", style("successfully").green()),
                (_, Some(step)) => format!("{} at {}", style("failed").red(), style(step).red()),
                _ => style("failed").red().to_string(),
            };
            format!(
                "{} {} ({}) {}",
                if *status == JobState::Completed { CHECK } else { CROSS },
                style(job).bold(),
                style(short_id(execution_id)).dim(),
                status_str
            )
        }
    };
    Some(line)
}

/// Format one step of a pipeline plan
pub fn format_plan_step(index: usize, step: &Step) -> String {
    let mut flags = Vec::new();
    if step.halt_on_failure {
        flags.push("halt");
    }
    if step.hide_when_successful {
        flags.push("hidden");
    }
    let produces = step
        .produces_property
        .as_ref()
        .map(|key| format!(" -> {}", style(key).cyan()))
        .unwrap_or_default();

    format!(
        "  {:>2}. {} [{}{}]{}\n      {}",
        index + 1,
        style(&step.name).bold(),
        step.kind.as_str(),
        if flags.is_empty() {
            String::new()
        } else {
            format!(", {}", flags.join(", "))
        },
        produces,
        style(&step.action).dim()
    )
}

/// One line per finished job run
pub fn format_job_run(run: &JobRun) -> String {
    let executed = run.result.records.len();
    match run.status() {
        JobState::Completed => format!(
            "{} {} ({} steps)",
            CHECK,
            style(&run.job_id).bold(),
            executed
        ),
        _ => format!(
            "{} {} stopped at {}",
            CROSS,
            style(&run.job_id).bold(),
            style(run.result.failed_step.as_deref().unwrap_or("worker lease")).red()
        ),
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

/// Human readable duration
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
