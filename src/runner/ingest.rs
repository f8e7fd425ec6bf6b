//! Hand-off of built packages to the repository's incoming queue

use crate::runner::{transfer, RunnerError};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Incoming queue of a distribution repository, one directory per distro
#[derive(Debug, Clone)]
pub struct IncomingQueue {
    root: PathBuf,
}

impl IncomingQueue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Queue directory for one distro
    pub fn distro_dir(&self, distro: &str) -> PathBuf {
        self.root.join(distro)
    }

    /// Move `artifact` into the queue of `distro`, world-readable and writable
    /// so the repository tool can pick it up.
    ///
    /// Returns the artifact's new path.
    pub async fn include(&self, package: &str, artifact: &Path, distro: &str, arch: &str) -> Result<PathBuf, RunnerError> {
        if !fs::try_exists(artifact).await.unwrap_or(false) {
            return Err(RunnerError::ArtifactMissing(artifact.display().to_string()));
        }

        let queue = self.distro_dir(distro);
        let writable = match fs::metadata(&queue).await {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(_) => false,
        };
        if !writable {
            return Err(RunnerError::DestinationNotWritable(queue.display().to_string()));
        }

        let file_name = artifact
            .file_name()
            .ok_or_else(|| RunnerError::ArtifactMissing(artifact.display().to_string()))?;
        let dest = queue.join(file_name);

        info!(
            "Moving package '{}' ({}) into incoming queue '{}'",
            package,
            arch,
            queue.display()
        );
        transfer::set_mode(artifact, 0o666).await?;

        if let Err(e) = fs::rename(artifact, &dest).await {
            // Queue may live on another filesystem
            warn!("Rename into {} failed ({}), copying instead", queue.display(), e);
            fs::copy(artifact, &dest).await.map_err(|e| RunnerError::io(&dest, e))?;
            fs::remove_file(artifact).await.map_err(|e| RunnerError::io(artifact, e))?;
        }

        Ok(dest)
    }
}
