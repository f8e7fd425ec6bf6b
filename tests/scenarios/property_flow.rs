//! Test: Property Flow - produced values reach later steps

use crate::helpers::*;
use debpipe::core::property::{Template, DATESTAMP, RELEASE_VERSION, WORKDIR};
use debpipe::core::step::{Action, SideEffectKind, Step};
use debpipe::core::{BuildError, Pipeline};

/// The stamp taken by getstamp names the changelog entry and the final .deb
#[tokio::test]
async fn test_datestamp_flows_into_later_steps() {
    let pipeline = assemble(&["foo"]);
    let runner = MockRunner::new();

    let result = run_on_worker(&pipeline, &runner).await;

    assert_pipeline_completed(&result);
    assert_eq!(result.properties["datestamp"], STAMP);

    let Some(Action::Command { argv, .. }) = runner.action_of("foo-stampdeb") else {
        panic!("stampdeb should run a command");
    };
    assert_eq!(argv.last().map(String::as_str), Some("0.8.1-0-20130105-1432+0100precise"));

    let Some(Action::Upload { src, dest, .. }) = runner.action_of("foo-uploadbinary") else {
        panic!("uploadbinary should upload");
    };
    let deb = "ros-groovy-foo_0.8.1-0-20130105-1432+0100precise_amd64.deb";
    assert_eq!(src, format!("/work/builder1/foo_stack_groovy_precise_amd64_debbuild/{}", deb));
    assert_eq!(dest, format!("binarydebs/{}", deb));
}

/// Source artifacts use the partial version for the orig tarball
#[tokio::test]
async fn test_source_uploads_use_release_versions() {
    let pipeline = assemble(&["foo"]);
    let runner = MockRunner::new();

    run_on_worker(&pipeline, &runner).await;

    let Some(Action::Upload { dest: orig, .. }) = runner.action_of("foo-uploadsource-orig") else {
        panic!("uploadsource-orig should upload");
    };
    assert_eq!(orig, "sourcedebs/ros-groovy-foo_0.8.1.orig.tar.gz");

    let Some(Action::Upload { dest: dsc, .. }) = runner.action_of("foo-uploadsource-dsc") else {
        panic!("uploadsource-dsc should upload");
    };
    assert_eq!(dsc, "sourcedebs/ros-groovy-foo_0.8.1-0precise.dsc");

    let Some(Action::Checkout { reference, .. }) = runner.action_of("foo-checkout") else {
        panic!("checkout should check out a tag");
    };
    assert_eq!(reference, "debian/ros-groovy-foo_0.8.1-0_precise");
}

/// Each run starts from a fresh property store
#[tokio::test]
async fn test_runs_do_not_share_properties() {
    let pipeline = assemble(&["foo"]);

    let first = run_on_worker(&pipeline, &MockRunner::new()).await;
    assert!(first.properties.contains_key("datestamp"));

    assert!(!pipeline.initial_properties().contains_key("datestamp"));
    assert_eq!(pipeline.initial_properties()["release_version"], "0.8.1-0");
    assert_eq!(pipeline.initial_properties()["partial_version"], "0.8.1");
}

/// Referencing a property before the step producing it is rejected up front
#[test]
fn test_reference_before_production_fails_construction() {
    let stamp_user = Step::new(
        "foo-stampdeb",
        SideEffectKind::Build,
        Action::Command {
            argv: vec![Template::property(&RELEASE_VERSION).lit("-").prop(&DATESTAMP)],
            env: vec![],
        },
    );
    let stamp = Step::new("foo-getstamp", SideEffectKind::Stamp, Action::Stamp).produces(DATESTAMP);

    let result = Pipeline::builder("foo_job")
        .property(&RELEASE_VERSION, "0.8.1-0")
        .step(stamp_user.clone())
        .step(stamp.clone())
        .build();
    assert!(matches!(result, Err(BuildError::UndefinedProperty { key }) if key == "datestamp"));

    let result = Pipeline::builder("foo_job")
        .property(&RELEASE_VERSION, "0.8.1-0")
        .step(stamp)
        .step(stamp_user)
        .build();
    assert!(result.is_ok());
}

/// A runtime key that the worker never supplies fails the step at execution
#[tokio::test]
async fn test_missing_runtime_property_fails_step() {
    let pipeline = Pipeline::builder("foo_job")
        .runtime_property(&WORKDIR)
        .step(
            Step::new(
                "foo_job-clean",
                SideEffectKind::Checkout,
                Action::Clean {
                    dir: Template::property(&WORKDIR),
                },
            )
            .halting(),
        )
        .build()
        .unwrap();
    let runner = MockRunner::new();

    let result = pipeline.run(&Default::default(), &runner).await;

    assert_pipeline_failed_at(&result, "foo_job-clean");
    assert_step_failed(&result, "foo_job-clean", "Undefined property 'workdir'");
    assert!(runner.trace().is_empty());
}
