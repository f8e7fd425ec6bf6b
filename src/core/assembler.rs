//! Assembly of debian build pipelines from package lists

use crate::core::{
    error::BuildError,
    naming::{self, NativePackages},
    pipeline::Pipeline,
    property::{Template, DATESTAMP, PARTIAL_VERSION, RELEASE_VERSION, WORKDIR, WORKERNAME},
    step::{Action, CheckoutMode, SideEffectKind, Step},
};
use serde::{Deserialize, Serialize};

/// Controller directory receiving source packages
pub const SOURCEDEBS_DIR: &str = "sourcedebs";
/// Controller directory receiving binary packages
pub const BINARYDEBS_DIR: &str = "binarydebs";
/// Controller path of the pbuilder dependency hook
pub const HOOK_SOURCE: &str = "hooks/D05deps";

/// Parameters of one build job (one distro/arch combination)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParams {
    /// Release repository holding the gbp branches and tags
    pub url: String,
    pub rosdistro: String,
    /// Release version, e.g. `0.8.1-0`
    pub version: String,
    pub distro: String,
    pub arch: String,
    #[serde(default)]
    pub othermirror: String,
    /// Keys the sandbox needs to verify its mirrors
    #[serde(default)]
    pub keys: Vec<String>,
    /// Jobs to trigger once this job has built every package
    #[serde(default)]
    pub trigger_pkgs: Vec<String>,
}

/// Builds one [`Pipeline`] per build job.
///
/// Assembly is pure: the same inputs always give the same steps in the same
/// order, and nothing runs until the pipeline is executed.
#[derive(Debug, Clone)]
pub struct PipelineAssembler {
    native: NativePackages,
    scripts_dir: String,
}

impl Default for PipelineAssembler {
    fn default() -> Self {
        Self::new(NativePackages::default(), "scripts")
    }
}

impl PipelineAssembler {
    pub fn new(native: NativePackages, scripts_dir: impl Into<String>) -> Self {
        Self {
            native,
            scripts_dir: scripts_dir.into(),
        }
    }

    pub fn native_packages(&self) -> &NativePackages {
        &self.native
    }

    /// Assemble the pipeline of `job` for one distro/arch combination
    pub fn assemble(&self, job: &str, packages: &[String], params: &BuildParams) -> Result<Pipeline, BuildError> {
        let mut steps = self.prologue(job, params);
        for package in packages {
            steps.extend(self.package_steps(package, params)?);
        }

        if !params.trigger_pkgs.is_empty() {
            let targets = params
                .trigger_pkgs
                .iter()
                .map(|t| Template::literal(naming::trigger_name(t, &params.rosdistro, &params.distro, &params.arch)))
                .collect();
            steps.push(Step::new(format!("{}-trigger", job), SideEffectKind::Trigger, Action::Trigger { targets }));
        }

        Pipeline::builder(naming::job_id(job, &params.rosdistro, &params.distro, &params.arch))
            .property(&RELEASE_VERSION, params.version.as_str())
            .property(&PARTIAL_VERSION, naming::partial_version(&params.version))
            .runtime_property(&WORKDIR)
            .runtime_property(&WORKERNAME)
            .steps(steps)
            .build()
    }

    /// Steps run once per job before any package is built
    fn prologue(&self, job: &str, params: &BuildParams) -> Vec<Step> {
        let mut update = vec![
            Template::literal("cowbuilder-update.py"),
            Template::literal(params.distro.as_str()),
            Template::literal(params.arch.as_str()),
        ];
        update.extend(params.keys.iter().map(|k| Template::literal(k.as_str())));

        vec![
            Step::new(
                format!("{}-clean", job),
                SideEffectKind::Checkout,
                Action::Clean { dir: Template::property(&WORKDIR) },
            )
            .hidden_on_success(),
            // Releases are tagged, not branched; always reset to the branch tip
            Step::new(
                format!("{}-git", job),
                SideEffectKind::Checkout,
                Action::Checkout {
                    repo_url: Some(Template::literal(params.url.as_str())),
                    reference: Template::literal("master"),
                    mode: CheckoutMode::Latest,
                },
            )
            .halting(),
            Step::new(
                format!("{}-update-cowbuilder", job),
                SideEffectKind::Build,
                Action::Command {
                    argv: update,
                    env: vec![("PATH".to_string(), Template::literal(format!("{}:${{PATH}}", self.scripts_dir)))],
                },
            )
            .hidden_on_success(),
        ]
    }

    fn package_steps(&self, package: &str, params: &BuildParams) -> Result<Vec<Step>, BuildError> {
        let debian = naming::debian_name(package, &params.rosdistro, &self.native)?;
        let distro = params.distro.as_str();
        let arch = params.arch.as_str();

        // {debian}_{release_version}{distro}
        let deb_name = Template::literal(format!("{}_", debian)).prop(&RELEASE_VERSION).lit(distro);
        // {debian}_{partial_version}
        let dsc_name = Template::literal(format!("{}_", debian)).prop(&PARTIAL_VERSION);
        // {debian}_{release_version}-{datestamp}{distro}_{arch}.deb
        let final_name = Template::literal(format!("{}_", debian))
            .prop(&RELEASE_VERSION)
            .lit("-")
            .prop(&DATESTAMP)
            .lit(format!("{}_{}.deb", distro, arch));

        let in_workdir = |name: &Template, suffix: &str| Template::property(&WORKDIR).lit("/").append(name).lit(suffix);
        let on_controller = |dir: &str, name: &Template, suffix: &str| {
            Template::literal(format!("{}/", dir)).append(name).lit(suffix)
        };
        let upload = |step: &str, name: &Template, suffix: &str, dir: &str| {
            Step::new(
                format!("{}-{}", package, step),
                SideEffectKind::Upload,
                Action::Upload {
                    src: in_workdir(name, suffix),
                    dest: on_controller(dir, name, suffix),
                    mode: 0o644,
                },
            )
        };
        let register = |step: &str, artifact: Template, label: &str| {
            Step::new(
                format!("{}-{}", package, step),
                SideEffectKind::Register,
                Action::Register {
                    package: Template::literal(debian.as_str()),
                    artifact,
                    distro: Template::literal(distro),
                    arch: Template::literal(arch),
                },
            )
            .described_as(format!("{} {}", label, package))
        };

        let mut buildsource = vec![Template::literal("git-buildpackage"), Template::literal("-S")];
        buildsource.extend(gbp_args(distro, arch));

        Ok(vec![
            // --force drops the changelog stamp left by the previous package
            Step::new(
                format!("{}-checkout", package),
                SideEffectKind::Checkout,
                Action::Checkout {
                    repo_url: None,
                    reference: Template::literal(format!("debian/{}_", debian))
                        .prop(&RELEASE_VERSION)
                        .lit(format!("_{}", distro)),
                    mode: CheckoutMode::ForcedTag,
                },
            )
            .halting()
            .hidden_on_success(),
            Step::new(
                format!("{}-buildsource", package),
                SideEffectKind::Build,
                Action::Command { argv: buildsource, env: vec![] },
            )
            .halting()
            .described_as(format!("sourcedeb {}", package)),
            upload("uploadsource-orig", &dsc_name, ".orig.tar.gz", SOURCEDEBS_DIR).hidden_on_success(),
            upload("uploadsource-tar", &deb_name, ".debian.tar.gz", SOURCEDEBS_DIR).hidden_on_success(),
            upload("uploadsource-dsc", &deb_name, ".dsc", SOURCEDEBS_DIR),
            Step::new(format!("{}-getstamp", package), SideEffectKind::Stamp, Action::Stamp)
                .produces(DATESTAMP)
                .hidden_on_success(),
            Step::new(
                format!("{}-stampdeb", package),
                SideEffectKind::Build,
                Action::Command {
                    argv: vec![
                        Template::literal("git-dch"),
                        Template::literal("-a"),
                        Template::literal("--ignore-branch"),
                        Template::literal("--verbose"),
                        Template::literal("-N"),
                        Template::property(&RELEASE_VERSION).lit("-").prop(&DATESTAMP).lit(distro),
                    ],
                    env: vec![],
                },
            )
            .halting()
            .described_as("stamped changelog"),
            Step::new(
                format!("{}-grab-hooks", package),
                SideEffectKind::Download,
                Action::Download {
                    src: Template::literal(HOOK_SOURCE),
                    dest: Template::property(&WORKDIR).lit(format!("/{}", HOOK_SOURCE)),
                    mode: 0o777,
                },
            )
            .hidden_on_success(),
            Step::new(
                format!("{}-buildbinary", package),
                SideEffectKind::Build,
                Action::SandboxBuild {
                    distro: Template::literal(distro),
                    arch: Template::literal(arch),
                    hook_dir: Template::property(&WORKDIR).lit("/hooks"),
                    export_dir: Template::property(&WORKDIR),
                    args: gbp_args(distro, arch),
                    env: vec![("OTHERMIRROR".to_string(), Template::literal(params.othermirror.as_str()))],
                },
            )
            .halting()
            .described_as(format!("binarydeb {}", package)),
            upload("uploadbinary", &final_name, "", BINARYDEBS_DIR).hidden_on_success(),
            register("includedeb", on_controller(BINARYDEBS_DIR, &final_name, ""), "updated deb in apt"),
            register("includedsc", on_controller(SOURCEDEBS_DIR, &deb_name, ".dsc"), "updated dsc in apt"),
        ])
    }
}

/// git-buildpackage arguments shared by the source and binary builds
pub fn gbp_args(distro: &str, arch: &str) -> Vec<Template> {
    [
        "-uc".to_string(),
        "-us".to_string(),
        "--git-ignore-branch".to_string(),
        "--git-ignore-new".to_string(),
        "--git-verbose".to_string(),
        format!("--git-dist={}", distro),
        format!("--git-arch={}", arch),
    ]
    .into_iter()
    .map(Template::literal)
    .collect()
}
