//! Test: Naming - Debian package names, builder ids and trigger names

use crate::helpers::*;
use debpipe::core::naming::{self, NativePackages};
use debpipe::core::{BuildError, PipelineAssembler};

#[test]
fn test_debian_names() {
    let native = NativePackages::default();

    assert_eq!(naming::debian_name("openrave", "groovy", &native).unwrap(), "openrave");
    assert_eq!(naming::debian_name("my_pkg", "groovy", &native).unwrap(), "ros-groovy-my-pkg");
    assert_eq!(
        naming::debian_name("Bad Name", "groovy", &native),
        Err(BuildError::InvalidPackageName("Bad Name".to_string()))
    );
}

#[test]
fn test_builder_and_trigger_names() {
    assert_eq!(naming::job_id("foo", "groovy", "precise", "amd64"), "foo_groovy_precise_amd64_debbuild");
    assert_eq!(
        naming::trigger_name("foo", "groovy", "precise", "amd64"),
        "foo-groovy-precise-amd64-debtrigger"
    );
    assert_eq!(naming::partial_version("0.8.1-0"), "0.8.1");
}

/// Each distro/arch pair of a job becomes its own builder and trigger
#[test]
fn test_config_expands_distros_and_archs() {
    let yaml = r#"
jobs:
  - name: foo_stack
    packages: [foo]
    url: https://github.com/org/foo_stack-release.git
    rosdistro: groovy
    version: 0.8.1-0
    distros: [precise, quantal]
    archs: [amd64, i386]
    machines: [builder1]
"#;

    let build = config(yaml);
    let ids: Vec<String> = build.build_jobs().iter().map(|job| job.job_id()).collect();
    assert_eq!(
        ids,
        vec![
            "foo_stack_groovy_precise_amd64_debbuild",
            "foo_stack_groovy_precise_i386_debbuild",
            "foo_stack_groovy_quantal_amd64_debbuild",
            "foo_stack_groovy_quantal_i386_debbuild",
        ]
    );

    let registry = build.to_registry().unwrap();
    assert_eq!(registry.len(), 4);
    assert_eq!(
        registry.trigger_targets("foo-stack-groovy-quantal-i386-debtrigger"),
        Some(&["foo_stack_groovy_quantal_i386_debbuild".to_string()][..])
    );
}

/// Native packages named in the config keep their name in the assembled steps
#[test]
fn test_configured_native_package() {
    let assembler = PipelineAssembler::new(NativePackages::new(["foo"]), "scripts");
    let pipeline = assembler
        .assemble("foo_stack", &packages(&["foo"]), &params("precise", "amd64"))
        .unwrap();

    let checkout = pipeline.step("foo-checkout").unwrap();
    assert!(checkout.action.to_string().contains("debian/foo_"));
}

#[test]
fn test_invalid_package_fails_assembly() {
    let result = PipelineAssembler::default().assemble("foo_stack", &packages(&["foo", "../evil"]), &params("precise", "amd64"));
    assert!(matches!(result, Err(BuildError::InvalidPackageName(name)) if name == "../evil"));
}
