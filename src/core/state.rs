//! Execution state models

use crate::core::step::{Outcome, SideEffectKind, Step};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a registered build job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Registered and never triggered
    Registered,
    /// Triggered, waiting for a free worker
    Queued,
    /// Pipeline is executing on a worker
    Running,
    /// Last run finished without a halting failure
    Completed,
    /// Last run stopped at a halting failure
    Failed,
}

impl JobState {
    /// Whether a trigger may queue the job now
    pub fn can_queue(&self) -> bool {
        !matches!(self, JobState::Queued | JobState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Registered => "registered",
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "registered" => Some(JobState::Registered),
            "queued" => Some(JobState::Queued),
            "running" => Some(JobState::Running),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }
}

/// Control state of a single pipeline run.
///
/// `Pending -> Executing(i) -> ... -> Completed | Failed(i)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Executing { step: usize },
    Completed,
    Failed { step: usize },
}

impl PipelineState {
    /// Leave `Pending` for a pipeline with `total` steps
    pub fn start(self, total: usize) -> Self {
        match self {
            PipelineState::Pending if total == 0 => PipelineState::Completed,
            PipelineState::Pending => PipelineState::Executing { step: 0 },
            other => other,
        }
    }

    /// Move past the step currently executing.
    ///
    /// Only a failed step that halts moves the run to `Failed`; a non-halting
    /// failure is recorded by the caller and execution continues.
    pub fn advance(self, failed: bool, halt_on_failure: bool, total: usize) -> Self {
        match self {
            PipelineState::Executing { step } if failed && halt_on_failure => PipelineState::Failed { step },
            PipelineState::Executing { step } if step + 1 < total => PipelineState::Executing { step: step + 1 },
            PipelineState::Executing { .. } => PipelineState::Completed,
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed { .. })
    }
}

/// Outcome of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepStatus {
    Succeeded { output: String },
    Failed { error: String },
}

/// Record of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub kind: SideEffectKind,
    #[serde(flatten)]
    pub status: StepStatus,
    pub halt_on_failure: bool,
    /// Successful and hidden from regular output
    pub hidden: bool,
    pub description_done: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn new(step: &Step, outcome: &Outcome, started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> Self {
        let status = match outcome {
            Outcome::Success(output) => StepStatus::Succeeded { output: output.clone() },
            Outcome::Failure(error) => StepStatus::Failed { error: error.to_string() },
        };
        let hidden = step.hide_when_successful && matches!(status, StepStatus::Succeeded { .. });

        Self {
            name: step.name.clone(),
            kind: step.kind,
            status,
            halt_on_failure: step.halt_on_failure,
            hidden,
            description_done: step.description_done.clone(),
            started_at,
            completed_at,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.status, StepStatus::Succeeded { .. })
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_queueing() {
        assert!(JobState::Registered.can_queue());
        assert!(JobState::Completed.can_queue());
        assert!(JobState::Failed.can_queue());
        assert!(!JobState::Queued.can_queue());
        assert!(!JobState::Running.can_queue());
    }

    #[test]
    fn test_job_state_round_trips_as_str() {
        for state in [
            JobState::Registered,
            JobState::Queued,
            JobState::Running,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(JobState::parse(state.as_str()), Some(state));
        }
        assert_eq!(JobState::parse("paused"), None);
    }

    #[test]
    fn test_pipeline_state_runs_every_step() {
        let mut state = PipelineState::Pending.start(3);
        let mut visited = Vec::new();
        while let PipelineState::Executing { step } = state {
            visited.push(step);
            state = state.advance(false, true, 3);
        }
        assert_eq!(visited, vec![0, 1, 2]);
        assert_eq!(state, PipelineState::Completed);
    }

    #[test]
    fn test_pipeline_state_halts_on_halting_failure() {
        let state = PipelineState::Pending.start(5);
        assert_eq!(state.advance(true, true, 5), PipelineState::Failed { step: 0 });
    }

    #[test]
    fn test_pipeline_state_continues_after_soft_failure() {
        let state = PipelineState::Executing { step: 3 };
        assert_eq!(state.advance(true, false, 5), PipelineState::Executing { step: 4 });
        assert_eq!(
            PipelineState::Executing { step: 4 }.advance(true, false, 5),
            PipelineState::Completed
        );
    }

    #[test]
    fn test_empty_pipeline_completes_immediately() {
        assert_eq!(PipelineState::Pending.start(0), PipelineState::Completed);
        assert!(PipelineState::Completed.advance(true, true, 0).is_terminal());
    }
}
