//! Test: Failure Handling - halting and non-halting step failures

use crate::helpers::*;
use debpipe::core::property::Template;
use debpipe::core::step::{Action, SideEffectKind, Step};
use debpipe::core::Pipeline;

fn command(name: &str) -> Step {
    Step::new(
        name,
        SideEffectKind::Build,
        Action::Command {
            argv: vec![Template::literal("true")],
            env: vec![],
        },
    )
}

/// A halting failure of the first step stops the pipeline right there
#[tokio::test]
async fn test_first_step_halting_failure() {
    let pipeline = Pipeline::builder("foo_job")
        .step(command("first").halting())
        .step(command("second"))
        .step(command("third"))
        .build()
        .unwrap();
    let runner = MockRunner::new().failing("first");

    let result = pipeline.run(&Default::default(), &runner).await;

    assert_pipeline_failed_at(&result, "first");
    assert_execution_order(&result, &["first"]);
    assert_eq!(runner.steps(), vec!["first"]);
}

/// Failing to fetch the release repository aborts the whole job
#[tokio::test]
async fn test_git_failure_stops_job() {
    let pipeline = assemble(&["foo_msgs", "foo"]);
    let runner = MockRunner::new().failing("foo_stack-git");

    let result = run_on_worker(&pipeline, &runner).await;

    assert_pipeline_failed_at(&result, "foo_stack-git");
    assert_step_failed(&result, "foo_stack-git", "scripted failure");
    assert_execution_order(&result, &["foo_stack-clean", "foo_stack-git"]);
}

/// A failed binary build stops before later packages are touched
#[tokio::test]
async fn test_binary_failure_skips_remaining_packages() {
    let pipeline = assemble(&["foo_msgs", "foo"]);
    let runner = MockRunner::new().failing("foo_msgs-buildbinary");

    let result = run_on_worker(&pipeline, &runner).await;

    assert_pipeline_failed_at(&result, "foo_msgs-buildbinary");
    assert_eq!(result.records.last().map(|r| r.name.as_str()), Some("foo_msgs-buildbinary"));
    assert!(runner.steps().iter().all(|step| !step.starts_with("foo-")));
    assert!(runner.action_of("foo_msgs-uploadbinary").is_none());
}

/// Non-halting failures are recorded and the pipeline carries on
#[tokio::test]
async fn test_soft_failures_do_not_fail_pipeline() {
    let pipeline = assemble(&["foo"]);
    let runner = MockRunner::new()
        .failing("foo_stack-update-cowbuilder")
        .failing("foo-uploadsource-dsc");

    let result = run_on_worker(&pipeline, &runner).await;

    assert_pipeline_completed(&result);
    assert_step_failed(&result, "foo_stack-update-cowbuilder", "exited with code 2");
    assert_step_failed(&result, "foo-uploadsource-dsc", "scripted failure");
    assert_step_succeeded(&result, "foo-includedsc");
    assert_eq!(result.records.len(), pipeline.steps().len());
}

/// Failed steps are never hidden, even when they hide on success
#[tokio::test]
async fn test_failed_hidden_step_is_reported() {
    let pipeline = assemble(&["foo"]);
    let runner = MockRunner::new().failing("foo-uploadsource-orig");

    let result = run_on_worker(&pipeline, &runner).await;

    let record = result
        .records
        .iter()
        .find(|r| r.name == "foo-uploadsource-orig")
        .unwrap();
    assert!(!record.succeeded());
    assert!(!record.hidden);

    let checkout = result.records.iter().find(|r| r.name == "foo-checkout").unwrap();
    assert!(checkout.hidden);
}
