//! Test: Stage Order - steps run exactly in assembly order

use crate::helpers::*;
use debpipe::core::SideEffectKind;

const STAGES: [&str; 12] = [
    "checkout",
    "buildsource",
    "uploadsource-orig",
    "uploadsource-tar",
    "uploadsource-dsc",
    "getstamp",
    "stampdeb",
    "grab-hooks",
    "buildbinary",
    "uploadbinary",
    "includedeb",
    "includedsc",
];

fn expected_order(names: &[&str]) -> Vec<String> {
    let mut order = vec![
        "foo_stack-clean".to_string(),
        "foo_stack-git".to_string(),
        "foo_stack-update-cowbuilder".to_string(),
    ];
    for name in names {
        order.extend(STAGES.iter().map(|stage| format!("{}-{}", name, stage)));
    }
    order
}

/// Execution order matches assembly order for every package permutation
#[tokio::test]
async fn test_execution_follows_assembly_order() {
    let permutations: [[&str; 3]; 6] = [
        ["foo_msgs", "foo", "foo_tools"],
        ["foo_msgs", "foo_tools", "foo"],
        ["foo", "foo_msgs", "foo_tools"],
        ["foo", "foo_tools", "foo_msgs"],
        ["foo_tools", "foo_msgs", "foo"],
        ["foo_tools", "foo", "foo_msgs"],
    ];

    for names in permutations {
        let pipeline = assemble(&names);
        let runner = MockRunner::new();

        let result = run_on_worker(&pipeline, &runner).await;

        assert_pipeline_completed(&result);
        assert_eq!(pipeline.step_names(), expected_order(&names));
        assert_eq!(runner.steps(), expected_order(&names));
        assert_eq!(result.executed_steps(), pipeline.step_names());
    }
}

/// A job without packages only prepares the worker
#[tokio::test]
async fn test_empty_package_list_runs_prologue() {
    let pipeline = assemble(&[]);
    let runner = MockRunner::new();

    let result = run_on_worker(&pipeline, &runner).await;

    assert_pipeline_completed(&result);
    assert_execution_order(
        &result,
        &["foo_stack-clean", "foo_stack-git", "foo_stack-update-cowbuilder"],
    );
}

/// Side-effect kinds line up with what each stage does
#[test]
fn test_stage_kinds() {
    let pipeline = assemble(&["foo"]);
    let kind = |name: &str| pipeline.step(name).map(|s| s.kind);

    assert_eq!(kind("foo-checkout"), Some(SideEffectKind::Checkout));
    assert_eq!(kind("foo-buildsource"), Some(SideEffectKind::Build));
    assert_eq!(kind("foo-uploadsource-dsc"), Some(SideEffectKind::Upload));
    assert_eq!(kind("foo-getstamp"), Some(SideEffectKind::Stamp));
    assert_eq!(kind("foo-grab-hooks"), Some(SideEffectKind::Download));
    assert_eq!(kind("foo-buildbinary"), Some(SideEffectKind::Build));
    assert_eq!(kind("foo-includedeb"), Some(SideEffectKind::Register));
}

/// Jobs with downstream triggers end with a single trigger step
#[test]
fn test_trigger_step_is_last() {
    let mut build = params("precise", "amd64");
    build.trigger_pkgs = packages(&["bar_stack", "baz_stack"]);

    let pipeline = debpipe::PipelineAssembler::default()
        .assemble("foo_stack", &packages(&["foo"]), &build)
        .unwrap();

    let last = pipeline.steps().last().unwrap();
    assert_eq!(last.name, "foo_stack-trigger");
    assert_eq!(last.kind, SideEffectKind::Trigger);
    assert_eq!(
        pipeline.fired_triggers(),
        vec![
            "bar-stack-groovy-precise-amd64-debtrigger",
            "baz-stack-groovy-precise-amd64-debtrigger"
        ]
    );
}
