//! Step domain model

use crate::core::{
    error::BuildError,
    property::{PropertyKey, PropertyStore, Template},
};
use crate::runner::{StepRequest, StepRunner};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of side effect a step has on the outside world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideEffectKind {
    Checkout,
    Build,
    Upload,
    Download,
    Stamp,
    Register,
    Trigger,
}

impl SideEffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SideEffectKind::Checkout => "checkout",
            SideEffectKind::Build => "build",
            SideEffectKind::Upload => "upload",
            SideEffectKind::Download => "download",
            SideEffectKind::Stamp => "stamp",
            SideEffectKind::Register => "register",
            SideEffectKind::Trigger => "trigger",
        }
    }
}

/// How a checkout treats the requested reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckoutMode {
    /// Reset to the tip of the branch, ignoring any revision hint
    Latest,
    /// Force-checkout a tag in the existing clone, discarding local changes
    ForcedTag,
}

/// The work a step asks its runner to do.
///
/// Generic over the string type: steps carry `Action<Template>`, runners
/// receive `Action<String>` once every template has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<T> {
    /// Remove a directory tree
    Clean { dir: T },
    Checkout {
        repo_url: Option<T>,
        reference: T,
        mode: CheckoutMode,
    },
    /// Run a command inside the source checkout
    Command { argv: Vec<T>, env: Vec<(String, T)> },
    /// Build a binary package inside the sandboxed chroot
    SandboxBuild {
        distro: T,
        arch: T,
        hook_dir: T,
        export_dir: T,
        args: Vec<T>,
        env: Vec<(String, T)>,
    },
    /// Copy a file from the worker to the controller
    Upload { src: T, dest: T, mode: u32 },
    /// Copy a file from the controller to the worker
    Download { src: T, dest: T, mode: u32 },
    /// Query the clock for a sortable timestamp
    Stamp,
    /// Hand an artifact to the repository's incoming queue
    Register {
        package: T,
        artifact: T,
        distro: T,
        arch: T,
    },
    /// Make downstream jobs eligible to run
    Trigger { targets: Vec<T> },
}

/// An action with every template resolved
pub type ResolvedAction = Action<String>;

impl<T> Action<T> {
    /// Convert every string position, stopping at the first error
    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<Action<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        let map_all = |items: &[T], f: &mut F| items.iter().map(|t| f(t)).collect::<Result<Vec<_>, E>>();
        let map_env = |env: &[(String, T)], f: &mut F| {
            env.iter()
                .map(|(k, v)| f(v).map(|v| (k.clone(), v)))
                .collect::<Result<Vec<_>, E>>()
        };

        Ok(match self {
            Action::Clean { dir } => Action::Clean { dir: f(dir)? },
            Action::Checkout { repo_url, reference, mode } => Action::Checkout {
                repo_url: repo_url.as_ref().map(&mut f).transpose()?,
                reference: f(reference)?,
                mode: *mode,
            },
            Action::Command { argv, env } => Action::Command {
                argv: map_all(argv, &mut f)?,
                env: map_env(env, &mut f)?,
            },
            Action::SandboxBuild { distro, arch, hook_dir, export_dir, args, env } => Action::SandboxBuild {
                distro: f(distro)?,
                arch: f(arch)?,
                hook_dir: f(hook_dir)?,
                export_dir: f(export_dir)?,
                args: map_all(args, &mut f)?,
                env: map_env(env, &mut f)?,
            },
            Action::Upload { src, dest, mode } => Action::Upload {
                src: f(src)?,
                dest: f(dest)?,
                mode: *mode,
            },
            Action::Download { src, dest, mode } => Action::Download {
                src: f(src)?,
                dest: f(dest)?,
                mode: *mode,
            },
            Action::Stamp => Action::Stamp,
            Action::Register { package, artifact, distro, arch } => Action::Register {
                package: f(package)?,
                artifact: f(artifact)?,
                distro: f(distro)?,
                arch: f(arch)?,
            },
            Action::Trigger { targets } => Action::Trigger {
                targets: map_all(targets, &mut f)?,
            },
        })
    }

    /// Every string position of the action, in declaration order
    pub fn fields(&self) -> Vec<&T> {
        let mut fields = Vec::new();
        match self {
            Action::Clean { dir } => fields.push(dir),
            Action::Checkout { repo_url, reference, .. } => {
                fields.extend(repo_url.iter());
                fields.push(reference);
            }
            Action::Command { argv, env } => {
                fields.extend(argv.iter());
                fields.extend(env.iter().map(|(_, v)| v));
            }
            Action::SandboxBuild { distro, arch, hook_dir, export_dir, args, env } => {
                fields.extend([distro, arch, hook_dir, export_dir]);
                fields.extend(args.iter());
                fields.extend(env.iter().map(|(_, v)| v));
            }
            Action::Upload { src, dest, .. } | Action::Download { src, dest, .. } => {
                fields.extend([src, dest]);
            }
            Action::Stamp => {}
            Action::Register { package, artifact, distro, arch } => {
                fields.extend([package, artifact, distro, arch]);
            }
            Action::Trigger { targets } => fields.extend(targets.iter()),
        }
        fields
    }
}

impl Action<Template> {
    /// Property keys referenced anywhere in the action
    pub fn references(&self) -> Vec<&PropertyKey> {
        self.fields().into_iter().flat_map(Template::references).collect()
    }
}

impl<T: fmt::Display> fmt::Display for Action<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(" ")
        }

        match self {
            Action::Clean { dir } => write!(f, "rm -rf {}", dir),
            Action::Checkout { repo_url: Some(url), reference, mode } => {
                write!(f, "checkout {} @ {} ({:?})", url, reference, mode)
            }
            Action::Checkout { repo_url: None, reference, mode } => {
                write!(f, "checkout {} ({:?})", reference, mode)
            }
            Action::Command { argv, .. } => write!(f, "{}", join(argv)),
            Action::SandboxBuild { distro, arch, args, .. } => {
                write!(f, "sandbox build {}/{}: {}", distro, arch, join(args))
            }
            Action::Upload { src, dest, mode } => write!(f, "upload {} -> {} ({:o})", src, dest, mode),
            Action::Download { src, dest, mode } => write!(f, "download {} -> {} ({:o})", src, dest, mode),
            Action::Stamp => write!(f, "stamp"),
            Action::Register { package, artifact, distro, arch } => {
                write!(f, "register {} {} {} {}", package, artifact, distro, arch)
            }
            Action::Trigger { targets } => write!(f, "trigger {}", join(targets)),
        }
    }
}

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(BuildError),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }
}

/// A single step in a pipeline
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step name within its pipeline
    pub name: String,

    pub kind: SideEffectKind,

    /// Templated work handed to the runner
    pub action: Action<Template>,

    /// Whether a failure stops the remaining steps
    pub halt_on_failure: bool,

    /// Whether a successful run is hidden from regular output
    pub hide_when_successful: bool,

    /// Property written with the trimmed runner output on success
    pub produces_property: Option<PropertyKey>,

    /// Short label shown once the step is done
    pub description_done: Option<String>,
}

impl Step {
    pub fn new(name: impl Into<String>, kind: SideEffectKind, action: Action<Template>) -> Self {
        Self {
            name: name.into(),
            kind,
            action,
            halt_on_failure: false,
            hide_when_successful: false,
            produces_property: None,
            description_done: None,
        }
    }

    pub fn halting(mut self) -> Self {
        self.halt_on_failure = true;
        self
    }

    pub fn hidden_on_success(mut self) -> Self {
        self.hide_when_successful = true;
        self
    }

    pub fn produces(mut self, key: PropertyKey) -> Self {
        self.produces_property = Some(key);
        self
    }

    pub fn described_as(mut self, label: impl Into<String>) -> Self {
        self.description_done = Some(label.into());
        self
    }

    /// Resolve the action against the current properties
    pub fn resolve(&self, store: &PropertyStore) -> Result<ResolvedAction, BuildError> {
        self.action.try_map(|template| store.interpolate(template))
    }

    /// Execute the step through the runner.
    ///
    /// Templates are resolved here, right before the runner is called; a
    /// missing property fails the step immediately.
    pub async fn execute(&self, job: &str, store: &mut PropertyStore, runner: &dyn StepRunner) -> Outcome {
        let action = match self.resolve(store) {
            Ok(action) => action,
            Err(e) => return Outcome::Failure(e),
        };

        let request = StepRequest {
            job,
            step: &self.name,
            kind: self.kind,
            action: &action,
        };

        match runner.run(&request).await {
            Ok(output) => {
                if let Some(key) = &self.produces_property {
                    store.set(key, output.trim());
                }
                Outcome::Success(output)
            }
            Err(e) => Outcome::Failure(BuildError::StepFailure {
                step: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
