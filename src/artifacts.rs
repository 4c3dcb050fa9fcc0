//! Filesystem-backed discovery and upload of files the agent generated.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::orchestrator::boundary::{ArtifactCollector, BoundaryFuture, ProgressSink};
use crate::{AppError, Result};

/// File names never treated as generated output.
pub const FIXED_EXCLUSIONS: [&str; 3] = ["Dockerfile", "pyproject.toml", "README.md"];

/// Scans a workspace and copies generated files into an output directory.
#[derive(Debug, Clone)]
pub struct FsArtifacts {
    root: PathBuf,
    output_dir: PathBuf,
}

impl FsArtifacts {
    /// Scan `root`; store uploads in `output_dir`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Every file under the root that survives [`is_excluded`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Artifact` if the root cannot be turned into a
    /// glob pattern.
    pub fn scan(&self, exclusions: &[String]) -> Result<Vec<PathBuf>> {
        let root = self
            .root
            .to_str()
            .ok_or_else(|| AppError::Artifact("workspace root is not valid UTF-8".into()))?;
        let pattern = format!("{}/**/*", glob::Pattern::escape(root));

        info!(root = %self.root.display(), "scanning for generated files");
        let found: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|err| AppError::Artifact(format!("invalid scan pattern: {err}")))?
            .flatten()
            .filter(|path| path.is_file())
            .filter(|path| !path.starts_with(&self.output_dir))
            .filter(|path| {
                let relative = path.strip_prefix(&self.root).unwrap_or(path.as_path());
                !is_excluded(relative, exclusions)
            })
            .collect();

        info!(count = found.len(), "generated files found");
        Ok(found)
    }

    async fn copy_all(&self, paths: &[PathBuf], progress: &dyn ProgressSink) -> Result<Vec<String>> {
        progress.notice(&format!("Uploading {} generated files...", paths.len()));
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|err| {
                AppError::Artifact(format!(
                    "cannot create {}: {err}",
                    self.output_dir.display()
                ))
            })?;

        let mut uploaded = Vec::new();
        let mut failures = 0_usize;
        for path in paths {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            match tokio::fs::copy(path, self.output_dir.join(&name)).await {
                Ok(bytes) => {
                    debug!(file = %name, bytes, "uploaded");
                    uploaded.push(name);
                }
                Err(err) => {
                    warn!(file = %name, %err, "upload failed");
                    progress.notice(&format!("Failed to upload {name}: {err}"));
                    failures += 1;
                }
            }
        }

        if !uploaded.is_empty() {
            progress.notice(&format!("Successfully uploaded {} files", uploaded.len()));
        }
        if failures > 0 {
            progress.notice(&format!("{failures} upload(s) failed"));
        }
        Ok(uploaded)
    }
}

/// Whether `relative` (a path under the scan root) is excluded.
///
/// A path is excluded when any component is listed in `exclusions` or
/// starts with `.`, when its extension (with the dot) is listed, or when
/// its name is one of [`FIXED_EXCLUSIONS`].
#[must_use]
pub fn is_excluded(relative: &Path, exclusions: &[String]) -> bool {
    let listed = |s: &str| exclusions.iter().any(|e| e == s);

    let hidden_or_listed = relative.components().any(|component| match component {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part.starts_with('.') || listed(&part)
        }
        _ => false,
    });
    if hidden_or_listed {
        return true;
    }

    if let Some(ext) = relative.extension() {
        if listed(&format!(".{}", ext.to_string_lossy())) {
            return true;
        }
    }

    relative
        .file_name()
        .is_some_and(|name| FIXED_EXCLUSIONS.iter().any(|fixed| name == *fixed))
}

impl ArtifactCollector for FsArtifacts {
    fn collect<'a>(&'a self, exclusions: &'a [String]) -> BoundaryFuture<'a, Result<Vec<PathBuf>>> {
        let this = self.clone();
        let exclusions = exclusions.to_vec();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || this.scan(&exclusions))
                .await
                .map_err(|err| AppError::Artifact(format!("scan task panicked: {err}")))?
        })
    }

    fn upload<'a>(
        &'a self,
        paths: &'a [PathBuf],
        progress: &'a dyn ProgressSink,
    ) -> BoundaryFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            if paths.is_empty() {
                info!("no files to upload");
                return Ok(Vec::new());
            }
            self.copy_all(paths, progress).await
        })
    }
}
