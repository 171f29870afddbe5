// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Container backend
//!
//! Runs stage command lines inside a container image via the docker CLI.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;

use super::{script_for, CommandOutput, ExecutionBackend};
use crate::errors::StagehandError;
use crate::pipeline::{Agent, Stage};

/// Workspace mount point inside the container
const CONTAINER_WORKDIR: &str = "/workspace";

/// Container backend
pub struct ContainerBackend {
    /// Path to the container runtime binary
    runtime_bin: PathBuf,
}

impl ContainerBackend {
    /// Create a container backend, locating the docker binary
    pub fn new() -> Result<Self, StagehandError> {
        let runtime_bin = which::which("docker").map_err(|_| {
            StagehandError::backend_unavailable("container", "docker not found on PATH")
        })?;

        Ok(Self { runtime_bin })
    }

    /// Build the `docker run` invocation for a stage
    fn build_command(
        &self,
        stage: &Stage,
        working_dir: &Path,
        env: &HashMap<String, String>,
    ) -> Result<Command, StagehandError> {
        let Agent::Container { image, mounts, args } = &stage.agent else {
            return Err(StagehandError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Expected container agent".to_string(),
            });
        };

        let mut cmd = Command::new(&self.runtime_bin);
        cmd.arg("run").arg("--rm");
        cmd.arg("-w").arg(CONTAINER_WORKDIR);
        cmd.arg("-v")
            .arg(format!("{}:{}", working_dir.display(), CONTAINER_WORKDIR));

        for mount in mounts {
            cmd.arg("-v").arg(mount);
        }

        for (key, value) in env {
            cmd.arg("-e").arg(format!("{}={}", key, value));
        }

        for arg in args {
            cmd.arg(arg);
        }

        cmd.arg(image);
        cmd.arg("sh").arg("-c").arg(script_for(&stage.run.lines()));
        cmd.kill_on_drop(true);

        Ok(cmd)
    }
}

#[async_trait]
impl ExecutionBackend for ContainerBackend {
    async fn run(
        &self,
        stage: &Stage,
        working_dir: &Path,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, StagehandError> {
        let mut cmd = self.build_command(stage, working_dir, env)?;

        let start = Instant::now();

        let output = cmd.output().await.map_err(|e| {
            StagehandError::backend_unavailable("container", e.to_string())
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    async fn check_available(&self) -> Result<bool, StagehandError> {
        // `docker version` fails when the daemon is unreachable,
        // which `which` alone can't tell us.
        let output = Command::new(&self.runtime_bin)
            .arg("version")
            .arg("--format")
            .arg("{{.Server.Version}}")
            .output()
            .await
            .map_err(|e| StagehandError::backend_unavailable("container", e.to_string()))?;

        Ok(output.status.success())
    }

    async fn version(&self) -> Result<String, StagehandError> {
        let output = Command::new(&self.runtime_bin)
            .arg("--version")
            .output()
            .await
            .map_err(|e| StagehandError::backend_unavailable("container", e.to_string()))?;

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
        let Agent::Container { image, mounts, .. } = &stage.agent else {
            return Err(StagehandError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Not a container stage".to_string(),
            });
        };

        if image.is_empty() {
            return Err(StagehandError::InvalidStage {
                stage: stage.name.clone(),
                reason: "Container image is empty".to_string(),
            });
        }

        for mount in mounts {
            if !mount.contains(':') {
                return Err(StagehandError::InvalidStage {
                    stage: stage.name.clone(),
                    reason: format!("Mount '{}' is not host:container form", mount),
                });
            }
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
