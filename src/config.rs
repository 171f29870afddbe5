// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Runner configuration
//!
//! Optional stagehand.toml beside the pipeline file. Everything has a
//! default; CLI flags override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::StagehandError;

/// Name of the runner configuration file
pub const CONFIG_FILE: &str = "stagehand.toml";

/// Runner configuration from stagehand.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Default shell for host stages
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Artifact store root, relative to the workspace
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,

    /// Default per-stage deadline in seconds
    #[serde(default)]
    pub default_timeout: Option<u64>,

    /// Output lines shown for failed stages in the report
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

fn default_shell() -> String {
    "bash".to_string()
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from(".stagehand/artifacts")
}

fn default_tail_lines() -> usize {
    crate::report::DEFAULT_TAIL_LINES
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            artifacts_dir: default_artifacts_dir(),
            default_timeout: None,
            tail_lines: default_tail_lines(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from `<dir>/stagehand.toml`, defaults when absent
    pub fn load(dir: &Path) -> Result<Self, StagehandError> {
        let path = dir.join(CONFIG_FILE);

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            StagehandError::FileReadError {
                path: path.clone(),
                error: e.to_string(),
            }
        })?;

        toml::from_str(&content).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunnerConfig::load(dir.path()).unwrap();
        assert_eq!(config.shell, "bash");
        assert_eq!(config.artifacts_dir, PathBuf::from(".stagehand/artifacts"));
        assert!(config.default_timeout.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "shell = \"sh\"\ndefault_timeout = 600\n",
        )
        .unwrap();

        let config = RunnerConfig::load(dir.path()).unwrap();
        assert_eq!(config.shell, "sh");
        assert_eq!(config.default_timeout, Some(600));
        assert_eq!(config.tail_lines, crate::report::DEFAULT_TAIL_LINES);
    }

    #[test]
    fn test_malformed_file_is_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "shell = [not toml").unwrap();

        let err = RunnerConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, StagehandError::Toml { .. }));
    }
}
