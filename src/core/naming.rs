//! Naming scheme for Debian packages, build jobs and triggers

use crate::core::error::BuildError;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Packages released under their own name instead of the `ros-{distro}-` prefix
pub const DEFAULT_NATIVE_PACKAGES: &[&str] = &["boost_numpy", "boost_numpy_eigen", "openrave"];

fn package_name_pattern() -> Result<&'static Regex, &'static regex::Error> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_.+-]*$"))
        .as_ref()
}

fn job_name_pattern() -> Result<&'static Regex, &'static regex::Error> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.+-]*$"))
        .as_ref()
}

/// Set of package names that keep their own Debian name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativePackages(BTreeSet<String>);

impl NativePackages {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, package: &str) -> bool {
        self.0.contains(package)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for NativePackages {
    fn default() -> Self {
        Self::new(DEFAULT_NATIVE_PACKAGES.iter().copied())
    }
}

/// Check that a package name can be turned into a Debian name
pub fn validate_package_name(package: &str) -> Result<(), BuildError> {
    let valid = package_name_pattern().map_or(false, |pattern| pattern.is_match(package));
    if valid {
        Ok(())
    } else {
        Err(BuildError::InvalidPackageName(package.to_string()))
    }
}

/// Check that a name can be used in builder ids and working directories
pub fn validate_job_name(name: &str) -> Result<(), BuildError> {
    let valid = job_name_pattern().map_or(false, |pattern| pattern.is_match(name));
    if valid {
        Ok(())
    } else {
        Err(BuildError::InvalidJobName(name.to_string()))
    }
}

/// Debian name for a package: native packages keep their name, everything
/// else is prefixed with `ros-{rosdistro}-`. Underscores become hyphens.
pub fn debian_name(package: &str, rosdistro: &str, native: &NativePackages) -> Result<String, BuildError> {
    validate_package_name(package)?;

    let hyphenated = package.replace('_', "-");
    if native.contains(package) {
        Ok(hyphenated)
    } else {
        Ok(format!("ros-{}-{}", rosdistro, hyphenated))
    }
}

/// Version without the Debian revision: text before the first hyphen
pub fn partial_version(release_version: &str) -> &str {
    release_version
        .split_once('-')
        .map_or(release_version, |(upstream, _)| upstream)
}

/// Builder id of one build job
pub fn job_id(job: &str, rosdistro: &str, distro: &str, arch: &str) -> String {
    format!("{}_{}_{}_{}_debbuild", job, rosdistro, distro, arch)
}

/// Name of the trigger that starts a build job
pub fn trigger_name(job: &str, rosdistro: &str, distro: &str, arch: &str) -> String {
    format!("{}-{}-{}-{}-debtrigger", job.replace('_', "-"), rosdistro, distro, arch)
}
