//! Pipeline domain model

use crate::core::{
    error::BuildError,
    property::{PropertyKey, PropertyStore},
    state::{PipelineState, StepRecord},
    step::Step,
};
use crate::runner::StepRunner;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Receives step records as a pipeline run produces them
pub trait StepObserver: Send + Sync {
    fn on_step(&self, job: &str, record: &StepRecord);
}

/// Observer that ignores every record
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn on_step(&self, _job: &str, _record: &StepRecord) {}
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub job_name: String,
    /// True iff no halting step failed
    pub completed: bool,
    pub failed_step: Option<String>,
    /// Final property values of the run
    pub properties: BTreeMap<String, String>,
    /// Every executed step, in execution order
    pub records: Vec<StepRecord>,
}

impl PipelineResult {
    pub fn executed_steps(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }
}

/// An ordered list of steps for one build job.
///
/// Immutable once built; every property a step references is known to be
/// initial, runtime-supplied or produced by an earlier step.
#[derive(Debug, Clone)]
pub struct Pipeline {
    job_name: String,
    steps: Vec<Step>,
    initial_properties: BTreeMap<String, String>,
    runtime_keys: BTreeSet<String>,
}

/// Collects steps and properties for a [`Pipeline`]
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    job_name: String,
    steps: Vec<Step>,
    initial_properties: BTreeMap<String, String>,
    runtime_keys: BTreeSet<String>,
}

impl PipelineBuilder {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            steps: Vec::new(),
            initial_properties: BTreeMap::new(),
            runtime_keys: BTreeSet::new(),
        }
    }

    /// Seed an initial property
    pub fn property(mut self, key: &PropertyKey, value: impl Into<String>) -> Self {
        self.initial_properties.insert(key.as_str().to_string(), value.into());
        self
    }

    /// Declare a property the hosting worker supplies at run time
    pub fn runtime_property(mut self, key: &PropertyKey) -> Self {
        self.runtime_keys.insert(key.as_str().to_string());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Validate step names and property references
    pub fn build(self) -> Result<Pipeline, BuildError> {
        let mut names = HashSet::new();
        let mut known: HashSet<&str> = self
            .initial_properties
            .keys()
            .chain(self.runtime_keys.iter())
            .map(String::as_str)
            .collect();

        for step in &self.steps {
            if !names.insert(step.name.as_str()) {
                return Err(BuildError::DuplicateStepName {
                    job: self.job_name.clone(),
                    step: step.name.clone(),
                });
            }

            // A step may not read the property it produces itself
            if let Some(key) = step.action.references().into_iter().find(|k| !known.contains(k.as_str())) {
                return Err(BuildError::undefined(key.as_str()));
            }

            if let Some(key) = &step.produces_property {
                known.insert(key.as_str());
            }
        }

        Ok(Pipeline {
            job_name: self.job_name,
            steps: self.steps,
            initial_properties: self.initial_properties,
            runtime_keys: self.runtime_keys,
        })
    }
}

impl Pipeline {
    pub fn builder(job_name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(job_name)
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn initial_properties(&self) -> &BTreeMap<String, String> {
        &self.initial_properties
    }

    pub fn runtime_keys(&self) -> &BTreeSet<String> {
        &self.runtime_keys
    }

    /// Step names in execution order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Trigger names fired by this pipeline's trigger steps
    pub fn fired_triggers(&self) -> Vec<String> {
        use crate::core::step::Action;

        self.steps
            .iter()
            .filter_map(|step| match &step.action {
                Action::Trigger { targets } => Some(targets.iter().map(|t| t.to_string())),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Run every step against the given properties
    pub async fn run(&self, initial: &BTreeMap<String, String>, runner: &dyn StepRunner) -> PipelineResult {
        self.run_with_observer(initial, runner, &NoopObserver).await
    }

    /// Run every step, reporting each record to `observer` as it finishes
    pub async fn run_with_observer(
        &self,
        initial: &BTreeMap<String, String>,
        runner: &dyn StepRunner,
        observer: &dyn StepObserver,
    ) -> PipelineResult {
        let mut store = PropertyStore::seeded(initial);
        let total = self.steps.len();
        let mut state = PipelineState::Pending.start(total);
        let mut records = Vec::with_capacity(total);

        info!("Starting pipeline {} ({} steps)", self.job_name, total);

        while let PipelineState::Executing { step: index } = state {
            let step = &self.steps[index];
            let started_at = Utc::now();
            let outcome = step.execute(&self.job_name, &mut store, runner).await;
            let record = StepRecord::new(step, &outcome, started_at, Utc::now());

            if record.hidden {
                debug!(job = %self.job_name, "Step {} completed", step.name);
            } else if record.succeeded() {
                info!(job = %self.job_name, "Step {} completed", step.name);
            } else {
                warn!(
                    job = %self.job_name,
                    halting = step.halt_on_failure,
                    "Step {} failed: {:?}",
                    step.name,
                    record.status
                );
            }

            observer.on_step(&self.job_name, &record);
            records.push(record);
            state = state.advance(outcome.is_failure(), step.halt_on_failure, total);
        }

        let failed_step = match state {
            PipelineState::Failed { step } => Some(self.steps[step].name.clone()),
            _ => None,
        };

        match &failed_step {
            Some(name) => warn!("Pipeline {} failed at step {}", self.job_name, name),
            None => info!("Pipeline {} completed", self.job_name),
        }

        PipelineResult {
            job_name: self.job_name.clone(),
            completed: failed_step.is_none(),
            failed_step,
            properties: store.snapshot(),
            records,
        }
    }
}
