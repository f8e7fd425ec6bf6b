//! Job scheduler - applies trigger fires to job states

use crate::core::state::JobState;
use crate::execution::registry::BuilderRegistry;
use std::collections::BTreeMap;

/// What a fire did to one target job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireDecision {
    /// The job moved to `Queued`
    Queue(String),
    /// The job was already queued or running and was left alone
    Ignore { job: String, state: JobState },
}

/// Tracks the state of every registered job
#[derive(Debug, Clone)]
pub struct JobScheduler {
    states: BTreeMap<String, JobState>,
}

impl JobScheduler {
    pub fn new(registry: &BuilderRegistry) -> Self {
        Self {
            states: registry
                .builders()
                .map(|b| (b.job_id.clone(), JobState::Registered))
                .collect(),
        }
    }

    /// Apply a fire to each target job
    pub fn fire(&mut self, targets: &[String]) -> Vec<FireDecision> {
        targets
            .iter()
            .filter_map(|job| {
                let state = self.states.get_mut(job)?;
                if state.can_queue() {
                    *state = JobState::Queued;
                    Some(FireDecision::Queue(job.clone()))
                } else {
                    Some(FireDecision::Ignore {
                        job: job.clone(),
                        state: *state,
                    })
                }
            })
            .collect()
    }

    /// A worker has picked the job up
    pub fn start(&mut self, job: &str) {
        if let Some(state) = self.states.get_mut(job) {
            *state = JobState::Running;
        }
    }

    /// The job's pipeline finished
    pub fn finish(&mut self, job: &str, completed: bool) {
        if let Some(state) = self.states.get_mut(job) {
            *state = if completed { JobState::Completed } else { JobState::Failed };
        }
    }

    pub fn state(&self, job: &str) -> Option<JobState> {
        self.states.get(job).copied()
    }

    pub fn states(&self) -> &BTreeMap<String, JobState> {
        &self.states
    }

    /// Whether no job is queued or running
    pub fn is_idle(&self) -> bool {
        self.states.values().all(JobState::can_queue)
    }
}
