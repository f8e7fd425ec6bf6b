//! File transfer between a worker's working area and the controller

use crate::runner::RunnerError;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Copy `src` to `dest` and apply `mode`.
///
/// Parent directories of `dest` are created and an existing file is
/// overwritten, so repeating a transfer leaves the same result.
pub async fn copy_with_mode(src: &Path, dest: &Path, mode: u32) -> Result<u64, RunnerError> {
    if !fs::try_exists(src).await.map_err(|e| RunnerError::io(src, e))? {
        return Err(RunnerError::ArtifactMissing(src.display().to_string()));
    }

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| RunnerError::io(parent, e))?;
    }

    let bytes = fs::copy(src, dest).await.map_err(|e| RunnerError::io(dest, e))?;
    set_mode(dest, mode).await?;

    debug!("Copied {} -> {} ({} bytes, mode {:o})", src.display(), dest.display(), bytes, mode);
    Ok(bytes)
}

/// Apply Unix permission bits
#[cfg(unix)]
pub async fn set_mode(path: &Path, mode: u32) -> Result<(), RunnerError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|e| RunnerError::io(path, e))
}

#[cfg(not(unix))]
pub async fn set_mode(_path: &Path, _mode: u32) -> Result<(), RunnerError> {
    Ok(())
}
