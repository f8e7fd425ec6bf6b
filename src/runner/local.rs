//! Runner executing every step on the local host

use crate::core::config::Settings;
use crate::core::property::WORKDIR;
use crate::core::step::{Action, CheckoutMode};
use crate::runner::{
    clock::{Clock, SystemClock},
    ingest::IncomingQueue,
    process::run_command,
    transfer::copy_with_mode,
    RunnerError, StepRequest, StepRunner,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Directory below the working area holding the source checkout
pub const CHECKOUT_DIR: &str = "build";

/// Configuration for the local runner
#[derive(Debug, Clone)]
pub struct LocalRunnerConfig {
    /// Parent of every job's working area
    pub build_root: PathBuf,

    /// Controller directory that relative transfer paths resolve against
    pub controller_root: PathBuf,

    /// Root of the repository's incoming queue
    pub incoming_dir: PathBuf,

    /// Timeout for a single command in seconds
    pub timeout_secs: u64,
}

impl Default for LocalRunnerConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl LocalRunnerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            build_root: settings.build_root.clone(),
            controller_root: settings.controller_root.clone(),
            incoming_dir: settings.incoming_dir.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }

    pub fn with_build_root(mut self, build_root: impl Into<PathBuf>) -> Self {
        self.build_root = build_root.into();
        self
    }

    pub fn with_controller_root(mut self, controller_root: impl Into<PathBuf>) -> Self {
        self.controller_root = controller_root.into();
        self
    }

    pub fn with_incoming_dir(mut self, incoming_dir: impl Into<PathBuf>) -> Self {
        self.incoming_dir = incoming_dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Runs checkouts, builds and transfers as local processes and file copies.
///
/// Each job gets its own working area below `build_root`; the source
/// checkout lives in its `build/` subdirectory and build products land next
/// to it, where the upload steps expect them.
#[derive(Clone)]
pub struct LocalRunner {
    config: LocalRunnerConfig,
    clock: Arc<dyn Clock>,
    queue: IncomingQueue,
}

impl LocalRunner {
    pub fn new(config: LocalRunnerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LocalRunnerConfig, clock: Arc<dyn Clock>) -> Self {
        let queue = IncomingQueue::new(config.incoming_dir.clone());
        Self { config, clock, queue }
    }

    pub fn config(&self) -> &LocalRunnerConfig {
        &self.config
    }

    /// Working area of a job
    pub fn workdir(&self, job: &str) -> PathBuf {
        self.config.build_root.join(job)
    }

    fn checkout_dir(&self, job: &str) -> PathBuf {
        self.workdir(job).join(CHECKOUT_DIR)
    }

    /// Relative paths refer to the controller directory
    fn on_controller(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.controller_root.join(path)
        }
    }

    async fn run_in(&self, dir: &Path, argv: Vec<String>, env: &[(String, String)]) -> Result<String, RunnerError> {
        run_command(&argv, env, dir, self.config.timeout_secs).await
    }

    async fn clean(&self, dir: &str) -> Result<String, RunnerError> {
        let dir = Path::new(dir);
        let escapes = dir.components().any(|c| matches!(c, Component::ParentDir));
        if escapes || !dir.starts_with(&self.config.build_root) {
            return Err(RunnerError::Internal(format!(
                "Refusing to remove {} outside of {}",
                dir.display(),
                self.config.build_root.display()
            )));
        }
        if fs::try_exists(dir).await.map_err(|e| RunnerError::io(dir, e))? {
            fs::remove_dir_all(dir).await.map_err(|e| RunnerError::io(dir, e))?;
        }
        Ok(format!("removed {}", dir.display()))
    }

    async fn checkout(&self, job: &str, repo_url: Option<&str>, reference: &str, mode: CheckoutMode) -> Result<String, RunnerError> {
        let src = self.checkout_dir(job);
        match mode {
            CheckoutMode::ForcedTag => {
                self.run_in(&src, vec!["git".into(), "checkout".into(), reference.into(), "--force".into()], &[])
                    .await
            }
            CheckoutMode::Latest => {
                let url = repo_url
                    .ok_or_else(|| RunnerError::Internal("Latest checkout needs a repository URL".to_string()))?;

                if fs::try_exists(src.join(".git")).await.unwrap_or(false) {
                    debug!("Updating existing clone in {}", src.display());
                    let mut output = self.run_in(&src, git(&["fetch", "origin"]), &[]).await?;
                    output += &self
                        .run_in(&src, git(&["reset", "--hard", &format!("origin/{}", reference)]), &[])
                        .await?;
                    output += &self.run_in(&src, git(&["clean", "-fdx"]), &[]).await?;
                    Ok(output)
                } else {
                    let workdir = self.workdir(job);
                    fs::create_dir_all(&workdir).await.map_err(|e| RunnerError::io(&workdir, e))?;
                    self.run_in(&workdir, git(&["clone", "--branch", reference, url, CHECKOUT_DIR]), &[])
                        .await
                }
            }
        }
    }
}

fn git(args: &[&str]) -> Vec<String> {
    std::iter::once("git").chain(args.iter().copied()).map(String::from).collect()
}

/// Command line and environment of a sandboxed binary build
pub fn sandbox_invocation(
    distro: &str,
    hook_dir: &str,
    export_dir: &str,
    args: &[String],
    env: &[(String, String)],
) -> (Vec<String>, Vec<(String, String)>) {
    let mut argv: Vec<String> = vec![
        "git-buildpackage".into(),
        "--git-pbuilder".into(),
        "--git-export=WC".into(),
        format!("--git-export-dir={}", export_dir),
    ];
    argv.extend(args.iter().cloned());

    let mut vars = vec![
        ("DIST".to_string(), distro.to_string()),
        (
            "GIT_PBUILDER_OPTIONS".to_string(),
            format!("--hookdir {} --override-config", hook_dir),
        ),
    ];
    vars.extend(env.iter().cloned());
    (argv, vars)
}

#[async_trait]
impl StepRunner for LocalRunner {
    async fn run(&self, request: &StepRequest<'_>) -> Result<String, RunnerError> {
        info!("[{}] {}: {}", request.job, request.step, request.action);

        match request.action {
            Action::Clean { dir } => self.clean(dir).await,
            Action::Checkout { repo_url, reference, mode } => {
                self.checkout(request.job, repo_url.as_deref(), reference, *mode).await
            }
            Action::Command { argv, env } => self.run_in(&self.checkout_dir(request.job), argv.clone(), env).await,
            Action::SandboxBuild { distro, hook_dir, export_dir, args, env, .. } => {
                let (argv, vars) = sandbox_invocation(distro, hook_dir, export_dir, args, env);
                self.run_in(&self.checkout_dir(request.job), argv, &vars).await
            }
            Action::Upload { src, dest, mode } => {
                let dest = self.on_controller(dest);
                let bytes = copy_with_mode(Path::new(src), &dest, *mode).await?;
                Ok(format!("uploaded {} bytes to {}", bytes, dest.display()))
            }
            Action::Download { src, dest, mode } => {
                let src = self.on_controller(src);
                let bytes = copy_with_mode(&src, Path::new(dest), *mode).await?;
                Ok(format!("downloaded {} bytes to {}", bytes, dest))
            }
            Action::Stamp => Ok(self.clock.now()),
            Action::Register { package, artifact, distro, arch } => {
                let dest = self
                    .queue
                    .include(package, &self.on_controller(artifact), distro, arch)
                    .await?;
                Ok(format!("queued {}", dest.display()))
            }
            Action::Trigger { .. } => Err(RunnerError::Internal(
                "Trigger steps must be run by the execution engine".to_string(),
            )),
        }
    }

    fn worker_properties(&self, job: &str, _worker: &str) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert(WORKDIR.as_str().to_string(), self.workdir(job).display().to_string());
        props
    }
}
