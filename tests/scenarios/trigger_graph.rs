//! Test: Trigger Graph - jobs start downstream jobs through the engine

use crate::helpers::*;
use debpipe::core::property::Template;
use debpipe::core::step::{Action, SideEffectKind, Step};
use debpipe::core::{JobState, Pipeline};
use debpipe::execution::{ExecutionEngine, ExecutionEvent, RegistryBuilder};
use debpipe::BuildError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const NETWORK: &str = r#"
settings:
  scripts_dir: /opt/buildbot-ros/scripts
jobs:
  - name: foo_stack
    packages: [foo]
    url: https://github.com/org/foo_stack-release.git
    rosdistro: groovy
    version: 0.8.1-0
    distros: [precise]
    archs: [amd64]
    machines: [builder1]
    trigger_pkgs: [bar_stack]
  - name: bar_stack
    packages: [bar]
    url: https://github.com/org/bar_stack-release.git
    rosdistro: groovy
    version: 1.2.0-0
    distros: [precise]
    archs: [amd64]
    machines: [builder1, builder2]
"#;

const FOO: &str = "foo_stack_groovy_precise_amd64_debbuild";
const BAR: &str = "bar_stack_groovy_precise_amd64_debbuild";

/// A completed job triggers its downstream job
#[tokio::test]
async fn test_completion_triggers_downstream() {
    let registry = Arc::new(config(NETWORK).to_registry().unwrap());
    assert_eq!(registry.roots(), vec![FOO]);
    assert_eq!(registry.downstream(FOO), vec![BAR]);

    let runner = Arc::new(MockRunner::new());
    let engine = ExecutionEngine::new(registry, runner.clone());

    let runs = engine.run_jobs(&[FOO.to_string()]).await.unwrap();

    let jobs: Vec<_> = runs.iter().map(|r| r.job_id.as_str()).collect();
    assert_eq!(jobs, vec![FOO, BAR]);
    assert!(runs.iter().all(|r| r.status() == JobState::Completed));
    assert_eq!(runner.job_order(), vec![FOO, BAR]);
    assert_eq!(runs[1].result.properties["release_version"], "1.2.0-0");
}

/// A halting failure never reaches the trigger step
#[tokio::test]
async fn test_failed_job_does_not_trigger() {
    let registry = Arc::new(config(NETWORK).to_registry().unwrap());
    let runner = Arc::new(MockRunner::new().failing("foo-buildsource"));
    let engine = ExecutionEngine::new(registry, runner.clone());

    let runs = engine.run_jobs(&[FOO.to_string()]).await.unwrap();

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status(), JobState::Failed);
    assert_eq!(runs[0].result.failed_step.as_deref(), Some("foo-buildsource"));
    assert!(runner.steps_of(BAR).is_empty());
}

/// Firing a job that is already queued or running does not start a second run
#[tokio::test]
async fn test_refire_while_running_is_ignored() {
    let registry = Arc::new(config(NETWORK).to_registry().unwrap());
    let runner = Arc::new(MockRunner::new().with_delay(Duration::from_millis(2)));
    let mut engine = ExecutionEngine::new(registry, runner.clone());

    let ignored = Arc::new(Mutex::new(Vec::new()));
    let seen = ignored.clone();
    engine.add_event_handler(move |event| {
        if let ExecutionEvent::TriggerIgnored { job, state, .. } = event {
            seen.lock().unwrap().push((job, state));
        }
    });

    let trigger = "bar-stack-groovy-precise-amd64-debtrigger".to_string();
    let runs = engine.run_until_idle(&[trigger.clone(), trigger]).await.unwrap();

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].job_id, BAR);
    let ignored = ignored.lock().unwrap();
    assert_eq!(ignored.len(), 1);
    assert_eq!(ignored[0].0, BAR);
    assert!(matches!(ignored[0].1, JobState::Queued | JobState::Running));
}

/// A job whose own trigger step fires it again is still running at that point
#[tokio::test]
async fn test_self_trigger_while_running_is_ignored() {
    let pipeline = Pipeline::builder("loop_job")
        .step(Step::new(
            "loop_job-build",
            SideEffectKind::Build,
            Action::Command {
                argv: vec![Template::literal("true")],
                env: vec![],
            },
        ))
        .step(Step::new(
            "loop_job-trigger",
            SideEffectKind::Trigger,
            Action::Trigger {
                targets: vec![Template::literal("loop-trigger")],
            },
        ))
        .build()
        .unwrap();

    let mut registry = RegistryBuilder::new();
    registry
        .register_builder("loop_job", pipeline, vec!["builder1".to_string()])
        .unwrap();
    registry
        .register_trigger("loop-trigger", vec!["loop_job".to_string()])
        .unwrap();
    let registry = Arc::new(registry.build().unwrap());

    let runner = Arc::new(MockRunner::new());
    let mut engine = ExecutionEngine::new(registry, runner.clone());

    let ignored = Arc::new(Mutex::new(Vec::new()));
    let seen = ignored.clone();
    engine.add_event_handler(move |event| {
        if let ExecutionEvent::TriggerIgnored { job, state, .. } = event {
            seen.lock().unwrap().push((job, state));
        }
    });

    let runs = tokio::time::timeout(
        Duration::from_secs(10),
        engine.run_until_idle(&["loop-trigger".to_string()]),
    )
    .await
    .expect("Network should go idle")
    .unwrap();

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status(), JobState::Completed);
    assert_eq!(*ignored.lock().unwrap(), vec![("loop_job".to_string(), JobState::Running)]);
    assert_eq!(runner.steps_of("loop_job"), vec!["loop_job-build"]);
}

/// A job may run again once its previous run has finished
#[tokio::test]
async fn test_engine_runs_job_again() {
    let registry = Arc::new(config(NETWORK).to_registry().unwrap());
    let runner = Arc::new(MockRunner::new());
    let engine = ExecutionEngine::new(registry, runner.clone());

    engine.run_jobs(&[BAR.to_string()]).await.unwrap();
    let runs = engine.run_jobs(&[BAR.to_string()]).await.unwrap();

    assert_eq!(runs.len(), 1);
    assert_eq!(runner.steps_of(BAR).len(), 2 * runs[0].result.records.len());
}

/// Trigger steps pointing at unregistered triggers are configuration errors
#[test]
fn test_dangling_trigger_is_rejected() {
    let yaml = NETWORK.replace("trigger_pkgs: [bar_stack]", "trigger_pkgs: [qux_stack]");

    let err = config(&yaml).to_registry().unwrap_err();
    let build_error = err.downcast_ref::<BuildError>().expect("Should be a build error");

    assert!(matches!(
        build_error,
        BuildError::DanglingTrigger { target, .. } if target == "qux-stack-groovy-precise-amd64-debtrigger"
    ));
}

/// Starting an unknown job fails before anything runs
#[tokio::test]
async fn test_unknown_job_is_rejected() {
    let registry = Arc::new(config(NETWORK).to_registry().unwrap());
    let runner = Arc::new(MockRunner::new());
    let engine = ExecutionEngine::new(registry, runner.clone());

    let result = engine.run_jobs(&["nope_groovy_precise_amd64_debbuild".to_string()]).await;

    assert!(matches!(result, Err(BuildError::DanglingTrigger { .. })));
    assert!(runner.trace().is_empty());
}

/// Registering the same builder twice is refused
#[test]
fn test_duplicate_builder_is_rejected() {
    let pipeline = assemble(&["foo"]);
    let mut registry = RegistryBuilder::new();
    registry
        .register_builder(FOO, pipeline.clone(), vec!["builder1".to_string()])
        .unwrap();

    let err = registry
        .register_builder(FOO, pipeline, vec!["builder1".to_string()])
        .unwrap_err();
    assert_eq!(err, BuildError::DuplicateJobName(FOO.to_string()));
}
