//! Build configuration from YAML

use crate::core::{
    assembler::{BuildParams, PipelineAssembler},
    naming::{self, NativePackages, DEFAULT_NATIVE_PACKAGES},
};
use crate::execution::registry::{BuilderRegistry, RegistryBuilder};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Top-level build configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub settings: Settings,

    /// Packages that keep their own Debian name
    #[serde(default = "default_native_packages")]
    pub native_packages: Vec<String>,

    /// Release jobs, each expanded over its distros and archs
    pub jobs: Vec<JobConfig>,
}

/// Host paths and limits used by the local runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Parent of every worker's working area
    #[serde(default = "default_build_root")]
    pub build_root: PathBuf,

    /// Controller directory receiving uploads and serving hooks
    #[serde(default = "default_controller_root")]
    pub controller_root: PathBuf,

    /// Root of the repository's incoming queue
    #[serde(default = "default_incoming_dir")]
    pub incoming_dir: PathBuf,

    /// Directory holding cowbuilder-update.py, prepended to PATH
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: String,

    /// Timeout of a single step in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            build_root: default_build_root(),
            controller_root: default_controller_root(),
            incoming_dir: default_incoming_dir(),
            scripts_dir: default_scripts_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// One release job as written in the build file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name, typically the metapackage name
    pub name: String,

    /// Packages to build, in build order
    pub packages: Vec<String>,

    /// URL of the release repository
    pub url: String,

    pub rosdistro: String,

    /// Release version, e.g. `0.8.1-0`
    pub version: String,

    pub distros: Vec<String>,

    pub archs: Vec<String>,

    /// Workers allowed to build this job
    pub machines: Vec<String>,

    #[serde(default)]
    pub othermirror: String,

    #[serde(default)]
    pub keys: Vec<String>,

    /// Jobs triggered after a successful build
    #[serde(default)]
    pub trigger_pkgs: Vec<String>,
}

/// A job expanded for one distro/arch combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub name: String,
    pub packages: Vec<String>,
    pub machines: Vec<String>,
    pub params: BuildParams,
}

impl BuildJob {
    pub fn job_id(&self) -> String {
        naming::job_id(&self.name, &self.params.rosdistro, &self.params.distro, &self.params.arch)
    }

    pub fn trigger_name(&self) -> String {
        naming::trigger_name(&self.name, &self.params.rosdistro, &self.params.distro, &self.params.arch)
    }
}

fn default_native_packages() -> Vec<String> {
    DEFAULT_NATIVE_PACKAGES.iter().map(|s| s.to_string()).collect()
}

fn default_build_root() -> PathBuf {
    PathBuf::from("/var/lib/debpipe/workers")
}

fn default_controller_root() -> PathBuf {
    PathBuf::from("/var/lib/debpipe/master")
}

fn default_incoming_dir() -> PathBuf {
    PathBuf::from("/var/www/packages/incoming/private")
}

fn default_scripts_dir() -> String {
    "scripts".to_string()
}

fn default_timeout_secs() -> u64 {
    10800
}

impl BuildConfig {
    /// Load build configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read build file: {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse build configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: BuildConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the build configuration
    pub fn validate(&self) -> Result<()> {
        let mut seen_names = HashSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                anyhow::bail!("Job name must not be empty");
            }
            if !seen_names.insert(&job.name) {
                anyhow::bail!("Duplicate job name: {}", job.name);
            }
            if job.packages.is_empty() {
                anyhow::bail!("Job '{}' has no packages", job.name);
            }
            if job.machines.is_empty() {
                anyhow::bail!("Job '{}' has no machines", job.name);
            }
            if job.distros.is_empty() || job.archs.is_empty() {
                anyhow::bail!("Job '{}' needs at least one distro and one arch", job.name);
            }
            if job.version.trim().is_empty() {
                anyhow::bail!("Job '{}' has an empty version", job.name);
            }
            // These end up in builder ids and working directory paths
            naming::validate_job_name(&job.name)?;
            for part in std::iter::once(&job.rosdistro).chain(&job.distros).chain(&job.archs) {
                naming::validate_job_name(part)
                    .with_context(|| format!("Job '{}' has an invalid rosdistro, distro or arch", job.name))?;
            }
            for package in &job.packages {
                naming::validate_package_name(package)
                    .with_context(|| format!("Job '{}' lists an invalid package", job.name))?;
            }
        }

        Ok(())
    }

    pub fn native(&self) -> NativePackages {
        NativePackages::new(self.native_packages.iter().cloned())
    }

    pub fn assembler(&self) -> PipelineAssembler {
        PipelineAssembler::new(self.native(), self.settings.scripts_dir.clone())
    }

    /// Expand every job over its distros and archs, in file order
    pub fn build_jobs(&self) -> Vec<BuildJob> {
        let mut build_jobs = Vec::new();
        for job in &self.jobs {
            for distro in &job.distros {
                for arch in &job.archs {
                    build_jobs.push(BuildJob {
                        name: job.name.clone(),
                        packages: job.packages.clone(),
                        machines: job.machines.clone(),
                        params: BuildParams {
                            url: job.url.clone(),
                            rosdistro: job.rosdistro.clone(),
                            version: job.version.clone(),
                            distro: distro.clone(),
                            arch: arch.clone(),
                            othermirror: job.othermirror.clone(),
                            keys: job.keys.clone(),
                            trigger_pkgs: job.trigger_pkgs.clone(),
                        },
                    });
                }
            }
        }
        build_jobs
    }

    /// Assemble every build job and register it with its trigger
    pub fn to_registry(&self) -> Result<BuilderRegistry> {
        let assembler = self.assembler();
        let mut registry = RegistryBuilder::new();

        for build_job in self.build_jobs() {
            let pipeline = assembler
                .assemble(&build_job.name, &build_job.packages, &build_job.params)
                .with_context(|| format!("Failed to assemble job '{}'", build_job.job_id()))?;
            let job_id = build_job.job_id();
            registry.register_builder(&job_id, pipeline, build_job.machines.clone())?;
            registry.register_trigger(build_job.trigger_name(), vec![job_id])?;
        }

        Ok(registry.build()?)
    }
}
