//! Runners perform the side effects of pipeline steps

pub mod clock;
pub mod ingest;
pub mod local;
pub mod process;
pub mod transfer;

use crate::core::step::{ResolvedAction, SideEffectKind};
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use ingest::IncomingQueue;
pub use local::{LocalRunner, LocalRunnerConfig};

/// Error types for runner operations
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("'{program}' exited with code {code}: {stderr}")]
    Exit { program: String, code: i32, stderr: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact not found: {0}")]
    ArtifactMissing(String),

    #[error("Destination not writable: {0}")]
    DestinationNotWritable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RunnerError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// A fully resolved step handed to a runner
#[derive(Debug, Clone, Copy)]
pub struct StepRequest<'a> {
    /// Job the step belongs to
    pub job: &'a str,
    pub step: &'a str,
    pub kind: SideEffectKind,
    pub action: &'a ResolvedAction,
}

/// Performs the side effects of steps on behalf of a pipeline
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Run one step; the captured output is returned on success
    async fn run(&self, request: &StepRequest<'_>) -> Result<String, RunnerError>;

    /// Runtime properties a worker contributes to each run of `job`
    fn worker_properties(&self, _job: &str, _worker: &str) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}
