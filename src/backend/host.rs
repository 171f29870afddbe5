// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Host backend
//!
//! Runs stage command lines through a shell on the host.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tokio::process::Command;

use super::{script_for, CommandOutput, ExecutionBackend};
use crate::errors::StagehandError;
use crate::pipeline::{Agent, Stage};

/// Host shell backend
pub struct HostBackend {
    /// Default shell when the stage agent doesn't name one
    default_shell: String,
}

impl HostBackend {
    /// Create a host backend with a default shell
    pub fn new(default_shell: impl Into<String>) -> Self {
        Self {
            default_shell: default_shell.into(),
        }
    }

    fn shell_for(&self, stage: &Stage) -> Result<String, StagehandError> {
        match &stage.agent {
            Agent::Host { shell } => Ok(shell.clone()),
            Agent::Container { .. } => Err(StagehandError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Expected host agent".to_string(),
            }),
        }
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new("bash")
    }
}

#[async_trait]
impl ExecutionBackend for HostBackend {
    async fn run(
        &self,
        stage: &Stage,
        working_dir: &Path,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, StagehandError> {
        let shell = self.shell_for(stage)?;
        let script = script_for(&stage.run.lines());

        let start = Instant::now();

        let mut cmd = Command::new(&shell);
        cmd.arg("-c").arg(&script);
        cmd.current_dir(working_dir);
        cmd.envs(env);
        // An aborted run drops the in-flight future; take the child with it.
        cmd.kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            StagehandError::backend_unavailable("host", format!("shell '{}': {}", shell, e))
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    async fn check_available(&self) -> Result<bool, StagehandError> {
        Ok(which::which(&self.default_shell).is_ok())
    }

    async fn version(&self) -> Result<String, StagehandError> {
        let output = Command::new(&self.default_shell)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                StagehandError::backend_unavailable(
                    "host",
                    format!("shell '{}': {}", self.default_shell, e),
                )
            })?;

        let version_str = String::from_utf8_lossy(&output.stdout);
        let version = version_str
            .lines()
            .next()
            .unwrap_or("unknown")
            .trim()
            .to_string();

        Ok(version)
    }

    fn validate_stage(&self, stage: &Stage) -> Result<(), StagehandError> {
        let Agent::Host { shell } = &stage.agent else {
            return Err(StagehandError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Not a host stage".to_string(),
            });
        };

        if shell.is_empty() {
            return Err(StagehandError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Shell is empty".to_string(),
            });
        }

        if stage.run.is_empty() {
            return Err(StagehandError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Command list is empty".to_string(),
            });
        }

        Ok(())
    }
}
