//! Registry of build jobs, their workers and triggers
//!
//! Registration happens on a [`RegistryBuilder`]; [`RegistryBuilder::build`]
//! checks every cross reference and hands back a read-only
//! [`BuilderRegistry`] that the engine shares between jobs.

use crate::core::{error::BuildError, pipeline::Pipeline};
use crate::execution::trigger::TriggerGraph;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// One registered build job
#[derive(Debug, Clone)]
pub struct BuilderEntry {
    pub job_id: String,
    pub pipeline: Arc<Pipeline>,
    /// Workers allowed to run this job
    pub workers: Vec<String>,
}

/// Build phase of the registry
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    builders: Vec<BuilderEntry>,
    index: HashMap<String, usize>,
    triggers: BTreeMap<String, Vec<String>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_builder(
        &mut self,
        job_id: &str,
        pipeline: Pipeline,
        workers: Vec<String>,
    ) -> Result<(), BuildError> {
        if self.index.contains_key(job_id) {
            return Err(BuildError::DuplicateJobName(job_id.to_string()));
        }
        if workers.is_empty() {
            return Err(BuildError::NoWorkers(job_id.to_string()));
        }

        debug!("Registering builder {} on {:?}", job_id, workers);
        self.index.insert(job_id.to_string(), self.builders.len());
        self.builders.push(BuilderEntry {
            job_id: job_id.to_string(),
            pipeline: Arc::new(pipeline),
            workers,
        });
        Ok(())
    }

    /// Register a trigger starting `targets`; returns the trigger name
    pub fn register_trigger(&mut self, name: impl Into<String>, targets: Vec<String>) -> Result<String, BuildError> {
        let name = name.into();
        if self.triggers.contains_key(&name) {
            return Err(BuildError::DuplicateTriggerName(name));
        }

        debug!("Registering trigger {} -> {:?}", name, targets);
        self.triggers.insert(name.clone(), targets);
        Ok(name)
    }

    /// Check every reference and freeze the registry
    pub fn build(self) -> Result<BuilderRegistry, BuildError> {
        for (name, targets) in &self.triggers {
            if let Some(target) = targets.iter().find(|t| !self.index.contains_key(t.as_str())) {
                return Err(BuildError::DanglingTrigger {
                    source_name: name.clone(),
                    what: "builder",
                    target: target.clone(),
                });
            }
        }

        let mut edges = BTreeMap::new();
        for entry in &self.builders {
            let fired = entry.pipeline.fired_triggers();
            if let Some(target) = fired.iter().find(|t| !self.triggers.contains_key(t.as_str())) {
                return Err(BuildError::DanglingTrigger {
                    source_name: entry.job_id.clone(),
                    what: "trigger",
                    target: target.clone(),
                });
            }
            if !fired.is_empty() {
                edges.insert(entry.job_id.clone(), fired);
            }
        }

        Ok(BuilderRegistry {
            builders: self.builders,
            index: self.index,
            graph: TriggerGraph::new(self.triggers, edges),
        })
    }
}

/// Read-only table of build jobs and the trigger graph between them
#[derive(Debug)]
pub struct BuilderRegistry {
    builders: Vec<BuilderEntry>,
    index: HashMap<String, usize>,
    graph: TriggerGraph,
}

impl BuilderRegistry {
    pub fn builder(&self, job_id: &str) -> Option<&BuilderEntry> {
        self.index.get(job_id).map(|&i| &self.builders[i])
    }

    /// Builders in registration order
    pub fn builders(&self) -> impl Iterator<Item = &BuilderEntry> {
        self.builders.iter()
    }

    pub fn trigger_targets(&self, trigger: &str) -> Option<&[String]> {
        self.graph.targets(trigger)
    }

    /// Jobs started when `job_id` completes
    pub fn downstream(&self, job_id: &str) -> Vec<String> {
        self.graph.downstream(job_id)
    }

    pub fn graph(&self) -> &TriggerGraph {
        &self.graph
    }

    /// Jobs that no other pipeline triggers
    pub fn roots(&self) -> Vec<&str> {
        self.builders
            .iter()
            .map(|b| b.job_id.as_str())
            .filter(|job| !self.graph.has_upstream(job))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}
