// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Filesystem artifact store
//!
//! Layout: `<root>/<run_id>/<key>/manifest.json` plus the captured files
//! under `<root>/<run_id>/<key>/files/`, keyed by workspace-relative path.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{ArtifactStore, StashManifest};
use crate::errors::StagehandError;

/// Filesystem-backed artifact store
pub struct FilesystemStore {
    /// Store root directory
    root: PathBuf,
}

impl FilesystemStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StagehandError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StagehandError::ArtifactStore {
            message: format!("cannot create store root '{}': {}", root.display(), e),
        })?;

        Ok(Self { root })
    }

    fn key_dir(&self, run_id: &str, key: &str) -> PathBuf {
        self.root.join(run_id).join(key)
    }

    /// Resolve glob patterns against the workspace, files only
    fn resolve_patterns(
        patterns: &[&str],
        workspace: &Path,
    ) -> Result<Vec<PathBuf>, StagehandError> {
        let mut files = Vec::new();

        for pattern in patterns {
            let full_pattern = workspace.join(pattern).to_string_lossy().to_string();

            let matches: Vec<_> = glob::glob(&full_pattern)
                .map_err(|e| StagehandError::GlobPattern { message: e.to_string() })?
                .filter_map(Result::ok)
                .filter(|p| p.is_file())
                .collect();

            if matches.is_empty() {
                return Err(StagehandError::NoStashMatches {
                    pattern: pattern.to_string(),
                });
            }

            files.extend(matches);
        }

        Ok(files)
    }
}

#[async_trait]
impl ArtifactStore for FilesystemStore {
    async fn stash(
        &self,
        run_id: &str,
        key: &str,
        patterns: &[&str],
        workspace: &Path,
    ) -> Result<usize, StagehandError> {
        let matched = Self::resolve_patterns(patterns, workspace)?;
        let key_dir = self.key_dir(run_id, key);
        let files_dir = key_dir.join("files");

        let mut relative = Vec::with_capacity(matched.len());

        for path in &matched {
            let rel = path
                .strip_prefix(workspace)
                .map_err(|_| StagehandError::ArtifactStore {
                    message: format!("'{}' is outside the workspace", path.display()),
                })?
                .to_path_buf();

            let dest = files_dir.join(&rel);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StagehandError::ArtifactStore {
                        message: format!("cannot create '{}': {}", parent.display(), e),
                    }
                })?;
            }

            tokio::fs::copy(path, &dest).await.map_err(|e| {
                StagehandError::ArtifactStore {
                    message: format!("cannot stash '{}': {}", path.display(), e),
                }
            })?;

            relative.push(rel);
        }

        let manifest = StashManifest {
            key: key.to_string(),
            files: relative,
        };

        let manifest_path = key_dir.join("manifest.json");
        let json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(&manifest_path, json).await.map_err(|e| {
            StagehandError::FileWriteError {
                path: manifest_path,
                error: e.to_string(),
            }
        })?;

        tracing::debug!(run_id, key, files = manifest.files.len(), "stashed artifacts");

        Ok(manifest.files.len())
    }

    async fn unstash(
        &self,
        run_id: &str,
        key: &str,
        workspace: &Path,
    ) -> Result<Vec<PathBuf>, StagehandError> {
        let key_dir = self.key_dir(run_id, key);
        let manifest_path = key_dir.join("manifest.json");

        if !manifest_path.exists() {
            return Err(StagehandError::ArtifactNotFound {
                key: key.to_string(),
            });
        }

        let json = tokio::fs::read_to_string(&manifest_path).await.map_err(|e| {
            StagehandError::FileReadError {
                path: manifest_path,
                error: e.to_string(),
            }
        })?;

        let manifest: StashManifest = serde_json::from_str(&json)?;
        let files_dir = key_dir.join("files");

        for rel in &manifest.files {
            let src = files_dir.join(rel);
            let dest = workspace.join(rel);

            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StagehandError::ArtifactStore {
                        message: format!("cannot create '{}': {}", parent.display(), e),
                    }
                })?;
            }

            tokio::fs::copy(&src, &dest).await.map_err(|e| {
                StagehandError::ArtifactStore {
                    message: format!("cannot restore '{}': {}", rel.display(), e),
                }
            })?;
        }

        tracing::debug!(run_id, key, files = manifest.files.len(), "unstashed artifacts");

        Ok(manifest.files)
    }

    async fn clear_run(&self, run_id: &str) -> Result<(), StagehandError> {
        let run_dir = self.root.join(run_id);

        if run_dir.exists() {
            tokio::fs::remove_dir_all(&run_dir).await.map_err(|e| {
                StagehandError::ArtifactStore {
                    message: format!("cannot clear run '{}': {}", run_id, e),
                }
            })?;
        }

        Ok(())
    }
}
