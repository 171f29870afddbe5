// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Artifact store
//!
//! Stash/unstash hand-off between stages. Every key is namespaced by
//! run id, so concurrent runs never observe each other's artifacts.
//! A stash lives for a single run; `clear_run` removes its namespace.

mod filesystem;

pub use filesystem::FilesystemStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::StagehandError;

/// Trait for artifact store implementations
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Capture files matching `patterns` (relative to `workspace`) under
    /// `key` for this run. Returns the number of files stashed.
    async fn stash(
        &self,
        run_id: &str,
        key: &str,
        patterns: &[&str],
        workspace: &Path,
    ) -> Result<usize, StagehandError>;

    /// Restore the files stashed under `key` in this run into `workspace`.
    /// Returns the workspace-relative paths restored. Fails with
    /// `ArtifactNotFound` for a key never stashed in this run.
    async fn unstash(
        &self,
        run_id: &str,
        key: &str,
        workspace: &Path,
    ) -> Result<Vec<PathBuf>, StagehandError>;

    /// Remove everything stashed for a run
    async fn clear_run(&self, run_id: &str) -> Result<(), StagehandError>;
}

/// Serialized record of one stash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashManifest {
    /// Stash key
    pub key: String,

    /// Workspace-relative paths captured
    pub files: Vec<PathBuf>,
}
