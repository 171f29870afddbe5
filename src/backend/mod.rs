// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Execution backends
//!
//! A backend runs one stage's command lines in its execution environment
//! and reports the captured output. A non-zero exit is a normal output,
//! not an error; `Err` from a backend means infrastructure failure
//! (spawn failed, daemon unreachable) and aborts the run.

mod container;
mod host;

pub use container::ContainerBackend;
pub use host::HostBackend;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::errors::StagehandError;
use crate::pipeline::Stage;

/// Captured output of one stage's command sequence
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code of the command sequence
    pub exit_code: i32,

    /// Execution duration
    pub duration: Duration,
}

impl CommandOutput {
    /// Whether the command sequence exited zero
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for stage execution backends
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Run a stage's command lines.
    ///
    /// # Arguments
    /// * `stage` - The stage configuration
    /// * `working_dir` - The workspace directory
    /// * `env` - Environment variables for the stage process
    async fn run(
        &self,
        stage: &Stage,
        working_dir: &Path,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, StagehandError>;

    /// Check if the backend's runtime is available
    async fn check_available(&self) -> Result<bool, StagehandError>;

    /// Get the backend runtime version
    async fn version(&self) -> Result<String, StagehandError>;

    /// Validate stage configuration against this backend
    fn validate_stage(&self, stage: &Stage) -> Result<(), StagehandError>;
}

/// Join command lines into one shell script. `set -e` makes a failing
/// line abort the rest, so the stage's exit code is the first failure.
pub(crate) fn script_for(lines: &[&str]) -> String {
    let mut script = String::from("set -e\n");
    for line in lines {
        script.push_str(line);
        script.push('\n');
    }
    script
}

/// Create the standard backend registry, keyed by agent kind
pub fn create_default_backends(shell: &str) -> HashMap<String, Box<dyn ExecutionBackend>> {
    let mut backends: HashMap<String, Box<dyn ExecutionBackend>> = HashMap::new();

    backends.insert("host".to_string(), Box::new(HostBackend::new(shell)));

    // Container backend only registers when a runtime is installed
    if let Ok(container) = ContainerBackend::new() {
        backends.insert("container".to_string(), Box::new(container));
    }

    backends
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_joins_lines_with_set_e() {
        let script = script_for(&["npm ci", "npm test"]);
        assert!(script.starts_with("set -e\n"));
        assert!(script.contains("npm ci\nnpm test\n"));
    }

    #[test]
    fn test_default_registry_always_has_host() {
        let backends = create_default_backends("bash");
        assert!(backends.contains_key("host"));
    }
}
