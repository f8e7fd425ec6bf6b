//! Persistence layer for job execution history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteExecutionStore;

pub use crate::core::JobState;
use crate::execution::JobRun;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of one job run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Builder id of the job
    pub job_name: String,

    /// Worker that ran the job
    pub worker: String,

    /// Final job state
    pub status: JobState,

    pub started_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Number of steps that succeeded
    pub completed_steps: usize,

    /// Number of steps in the pipeline
    pub total_steps: usize,

    /// Halting step the run stopped at
    pub failed_step: Option<String>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a job run
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>>;

    /// All runs of a job, newest first
    async fn list_executions(&self, job_name: &str) -> Result<Vec<ExecutionSummary>>;

    /// Most recent run of a job
    async fn latest_execution(&self, job_name: &str) -> Result<Option<ExecutionSummary>>;

    /// Most recent runs of any job, newest first
    async fn recent_executions(&self, limit: usize) -> Result<Vec<ExecutionSummary>>;

    async fn delete_execution(&self, execution_id: Uuid) -> Result<()>;

    /// Names of every job with recorded runs
    async fn list_jobs(&self) -> Result<Vec<String>>;
}

/// Latest run of every job with recorded history, by job name
pub async fn latest_per_job(store: &dyn PersistenceBackend) -> Result<Vec<ExecutionSummary>> {
    let mut latest = Vec::new();
    for job in store.list_jobs().await? {
        if let Some(summary) = store.latest_execution(&job).await? {
            latest.push(summary);
        }
    }
    Ok(latest)
}

/// In-memory persistence (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryPersistence {
    executions: RwLock<HashMap<Uuid, ExecutionSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut runs: Vec<ExecutionSummary>) -> Vec<ExecutionSummary> {
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    runs
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_execution(&self, execution: &ExecutionSummary) -> Result<()> {
        let mut execs = self.executions.write().await;
        execs.insert(execution.execution_id, execution.clone());
        Ok(())
    }

    async fn load_execution(&self, execution_id: Uuid) -> Result<Option<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(execs.get(&execution_id).cloned())
    }

    async fn list_executions(&self, job_name: &str) -> Result<Vec<ExecutionSummary>> {
        let execs = self.executions.read().await;
        Ok(newest_first(
            execs.values().filter(|e| e.job_name == job_name).cloned().collect(),
        ))
    }

    async fn latest_execution(&self, job_name: &str) -> Result<Option<ExecutionSummary>> {
        Ok(self.list_executions(job_name).await?.into_iter().next())
    }

    async fn recent_executions(&self, limit: usize) -> Result<Vec<ExecutionSummary>> {
        let execs = self.executions.read().await;
        let mut runs = newest_first(execs.values().cloned().collect());
        runs.truncate(limit);
        Ok(runs)
    }

    async fn delete_execution(&self, execution_id: Uuid) -> Result<()> {
        self.executions.write().await.remove(&execution_id);
        Ok(())
    }

    async fn list_jobs(&self) -> Result<Vec<String>> {
        let execs = self.executions.read().await;
        let mut jobs: Vec<String> = execs.values().map(|e| e.job_name.clone()).collect();
        jobs.sort();
        jobs.dedup();
        Ok(jobs)
    }
}

/// Create a summary from a finished job run
pub fn create_summary(run: &JobRun, total_steps: usize) -> ExecutionSummary {
    ExecutionSummary {
        execution_id: run.execution_id,
        job_name: run.job_id.clone(),
        worker: run.worker.clone(),
        status: run.status(),
        started_at: run.started_at,
        completed_at: Some(run.completed_at),
        completed_steps: run.result.records.iter().filter(|r| r.succeeded()).count(),
        total_steps,
        failed_step: run.result.failed_step.clone(),
    }
}
