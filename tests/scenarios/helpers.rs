//! Test utility functions for debpipe scenarios

use async_trait::async_trait;
use debpipe::core::config::BuildConfig;
use debpipe::core::step::{Action, ResolvedAction};
use debpipe::core::{BuildParams, Pipeline, PipelineAssembler, PipelineResult, StepStatus};
use debpipe::runner::{RunnerError, StepRequest, StepRunner};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

pub const STAMP: &str = "20130105-1432+0100";

/// One step as seen by the runner
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub job: String,
    pub step: String,
    pub action: ResolvedAction,
}

/// Runner that records every request and answers from a script
pub struct MockRunner {
    trace: Mutex<Vec<TraceEntry>>,
    failures: HashSet<String>,
    outputs: HashMap<String, String>,
    stamp: String,
    simulate_delay: Option<Duration>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            trace: Mutex::new(Vec::new()),
            failures: HashSet::new(),
            outputs: HashMap::new(),
            stamp: STAMP.to_string(),
            simulate_delay: None,
        }
    }

    /// Fail every run of `step`
    pub fn failing(mut self, step: &str) -> Self {
        self.failures.insert(step.to_string());
        self
    }

    pub fn with_output(mut self, step: &str, output: &str) -> Self {
        self.outputs.insert(step.to_string(), output.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.simulate_delay = Some(delay);
        self
    }

    pub fn trace(&self) -> Vec<TraceEntry> {
        self.trace.lock().unwrap().clone()
    }

    /// Step names in the order they ran
    pub fn steps(&self) -> Vec<String> {
        self.trace().into_iter().map(|e| e.step).collect()
    }

    /// Step names of one job in the order they ran
    pub fn steps_of(&self, job: &str) -> Vec<String> {
        self.trace()
            .into_iter()
            .filter(|e| e.job == job)
            .map(|e| e.step)
            .collect()
    }

    pub fn action_of(&self, step: &str) -> Option<ResolvedAction> {
        self.trace().into_iter().find(|e| e.step == step).map(|e| e.action)
    }

    /// Jobs in the order their first step ran
    pub fn job_order(&self) -> Vec<String> {
        let mut jobs: Vec<String> = Vec::new();
        for entry in self.trace() {
            if !jobs.contains(&entry.job) {
                jobs.push(entry.job);
            }
        }
        jobs
    }
}

#[async_trait]
impl StepRunner for MockRunner {
    async fn run(&self, request: &StepRequest<'_>) -> Result<String, RunnerError> {
        self.trace.lock().unwrap().push(TraceEntry {
            job: request.job.to_string(),
            step: request.step.to_string(),
            action: request.action.clone(),
        });

        if let Some(delay) = self.simulate_delay {
            tokio::time::sleep(delay).await;
        }

        if self.failures.contains(request.step) {
            return Err(RunnerError::Exit {
                program: request.step.to_string(),
                code: 2,
                stderr: "scripted failure".to_string(),
            });
        }

        if matches!(request.action, Action::Stamp) {
            return Ok(format!("{}\n", self.stamp));
        }

        Ok(self.outputs.get(request.step).cloned().unwrap_or_default())
    }

    fn worker_properties(&self, job: &str, worker: &str) -> BTreeMap<String, String> {
        BTreeMap::from([("workdir".to_string(), format!("/work/{}/{}", worker, job))])
    }
}

pub fn params(distro: &str, arch: &str) -> BuildParams {
    BuildParams {
        url: "https://github.com/org/foo_stack-release.git".to_string(),
        rosdistro: "groovy".to_string(),
        version: "0.8.1-0".to_string(),
        distro: distro.to_string(),
        arch: arch.to_string(),
        othermirror: "deb http://packages.ros.org/ros/ubuntu precise main".to_string(),
        keys: vec!["http://packages.ros.org/ros.key".to_string()],
        trigger_pkgs: Vec::new(),
    }
}

pub fn packages(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Assemble `foo_stack` for precise/amd64
pub fn assemble(names: &[&str]) -> Pipeline {
    PipelineAssembler::default()
        .assemble("foo_stack", &packages(names), &params("precise", "amd64"))
        .unwrap()
}

/// Run a pipeline the way a worker would, with workdir and workername set
pub async fn run_on_worker(pipeline: &Pipeline, runner: &MockRunner) -> PipelineResult {
    let mut initial = pipeline.initial_properties().clone();
    initial.extend(runner.worker_properties(pipeline.job_name(), "builder1"));
    initial.insert("workername".to_string(), "builder1".to_string());
    pipeline.run(&initial, runner).await
}

pub fn config(yaml: &str) -> BuildConfig {
    BuildConfig::from_yaml(yaml).expect("Should parse build config")
}

/// Assert that a step ran and succeeded
pub fn assert_step_succeeded(result: &PipelineResult, step: &str) {
    let record = result
        .records
        .iter()
        .find(|r| r.name == step)
        .unwrap_or_else(|| panic!("Step '{}' was not executed. Executed: {:?}", step, result.executed_steps()));
    assert!(
        record.succeeded(),
        "Step '{}' should have succeeded but got {:?}",
        step,
        record.status
    );
}

/// Assert that a step ran and failed with an error containing `contains`
pub fn assert_step_failed(result: &PipelineResult, step: &str, contains: &str) {
    let record = result
        .records
        .iter()
        .find(|r| r.name == step)
        .unwrap_or_else(|| panic!("Step '{}' was not executed. Executed: {:?}", step, result.executed_steps()));
    match &record.status {
        StepStatus::Failed { error } => assert!(
            error.contains(contains),
            "Step '{}' error should contain '{}', got '{}'",
            step,
            contains,
            error
        ),
        other => panic!("Step '{}' should have failed but got {:?}", step, other),
    }
}

pub fn assert_pipeline_completed(result: &PipelineResult) {
    assert!(
        result.completed,
        "Pipeline should have completed, stopped at {:?}",
        result.failed_step
    );
    assert!(result.failed_step.is_none());
}

pub fn assert_pipeline_failed_at(result: &PipelineResult, step: &str) {
    assert!(!result.completed, "Pipeline should have failed");
    assert_eq!(result.failed_step.as_deref(), Some(step));
}

/// Assert the exact order of executed steps
pub fn assert_execution_order(result: &PipelineResult, expected: &[&str]) {
    assert_eq!(
        result.executed_steps(),
        expected,
        "Execution order mismatch"
    );
}
