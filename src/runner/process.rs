//! Subprocess execution with a timeout

use crate::runner::RunnerError;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Expand `${PATH}` in an environment value with the current search path
pub fn expand_path_var(value: &str) -> String {
    if !value.contains("${PATH}") {
        return value.to_string();
    }
    let current = std::env::var("PATH").unwrap_or_default();
    value.replace("${PATH}", &current)
}

/// Run `argv` in `cwd` and capture its stdout.
///
/// # Errors
/// Returns `RunnerError` if:
/// - `argv` is empty or the program cannot be spawned
/// - the program exits with a non-zero status
/// - the command does not finish within `timeout_secs`
pub async fn run_command(
    argv: &[String],
    env: &[(String, String)],
    cwd: &Path,
    timeout_secs: u64,
) -> Result<String, RunnerError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| RunnerError::Internal("Empty command line".to_string()))?;

    debug!("Spawning {} {:?} in {}", program, args, cwd.display());

    let mut command = Command::new(program);
    command.args(args).current_dir(cwd).kill_on_drop(true);
    for (key, value) in env {
        command.env(key, expand_path_var(value));
    }

    let result = timeout(Duration::from_secs(timeout_secs), command.output())
        .await
        .map_err(|_| RunnerError::Timeout(timeout_secs))?;

    let output = result.map_err(|e| RunnerError::Spawn {
        program: program.clone(),
        reason: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        warn!("{} exited with code {}: {}", program, code, stderr.trim());
        return Err(RunnerError::Exit {
            program: program.clone(),
            code,
            stderr: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!("{} returned {} bytes of output", program, stdout.len());
    Ok(stdout)
}
