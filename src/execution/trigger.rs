//! Trigger graph linking build jobs

use serde::Serialize;
use std::collections::BTreeMap;

/// A request to start the jobs behind a trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerEvent {
    /// Name of the fired trigger
    pub trigger: String,
    /// Job whose pipeline fired it, `None` when fired from outside
    pub source: Option<String>,
}

impl TriggerEvent {
    pub fn external(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            source: None,
        }
    }

    pub fn from_job(trigger: impl Into<String>, job: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            source: Some(job.into()),
        }
    }
}

/// Named triggers and the edges pipelines fire along.
///
/// Edges are fire-and-forget: a source job never waits for, or hears back
/// from, the jobs it starts.
#[derive(Debug, Clone, Default)]
pub struct TriggerGraph {
    /// trigger name -> builders it starts
    targets: BTreeMap<String, Vec<String>>,
    /// source job -> trigger names its pipeline fires
    edges: BTreeMap<String, Vec<String>>,
}

impl TriggerGraph {
    pub(crate) fn new(targets: BTreeMap<String, Vec<String>>, edges: BTreeMap<String, Vec<String>>) -> Self {
        Self { targets, edges }
    }

    /// Builders started by a trigger
    pub fn targets(&self, trigger: &str) -> Option<&[String]> {
        self.targets.get(trigger).map(Vec::as_slice)
    }

    /// Triggers fired by a job's pipeline
    pub fn fired_by(&self, job: &str) -> &[String] {
        self.edges.get(job).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Jobs started, directly, when `job` completes
    pub fn downstream(&self, job: &str) -> Vec<String> {
        let mut jobs: Vec<String> = Vec::new();
        for target in self.fired_by(job).iter().filter_map(|t| self.targets(t)).flatten() {
            if !jobs.contains(target) {
                jobs.push(target.clone());
            }
        }
        jobs
    }

    /// Triggers that start `job`
    pub fn triggers_for(&self, job: &str) -> Vec<&str> {
        self.targets
            .iter()
            .filter(|(_, targets)| targets.iter().any(|t| t == job))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Whether any pipeline fires a trigger that starts `job`
    pub fn has_upstream(&self, job: &str) -> bool {
        self.edges.keys().any(|source| self.downstream(source).iter().any(|j| j == job))
    }

    pub fn triggers(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.targets.iter().map(|(name, targets)| (name.as_str(), targets.as_slice()))
    }
}
