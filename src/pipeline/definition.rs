// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Pipeline definition structures
//!
//! Defines the schema for .stagehand.yaml files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::pipeline::Guard;

/// Pipeline definition from .stagehand.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    /// Pipeline description
    #[serde(default)]
    pub description: Option<String>,

    /// Stages in execution order
    pub stages: Vec<Stage>,

    /// Global environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Post-actions run after the stage sequence, keyed by outcome
    #[serde(default)]
    pub post: PostActions,
}

fn default_version() -> String {
    "1".to_string()
}

impl Pipeline {
    /// Load pipeline from a YAML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::StagehandError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::StagehandError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            }
        })?;

        Self::from_yaml(&content)
    }

    /// Parse pipeline from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, crate::StagehandError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize pipeline to YAML
    pub fn to_yaml(&self) -> Result<String, crate::StagehandError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Get all stage names
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A single pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name (must be unique within pipeline)
    pub name: String,

    /// Stage description
    #[serde(default)]
    pub description: Option<String>,

    /// Where the stage executes
    #[serde(default)]
    pub agent: Agent,

    /// Shell command lines, in order
    pub run: Commands,

    /// Condition gating whether the stage executes
    #[serde(default)]
    pub when: Option<Guard>,

    /// What a non-zero exit does to the rest of the run
    #[serde(default)]
    pub on_error: ErrorPolicy,

    /// Environment variables for this stage
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Per-stage deadline in seconds
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Artifacts captured after the stage succeeds
    #[serde(default)]
    pub stash: Vec<StashSpec>,

    /// Artifact keys restored into the workspace before the stage runs
    #[serde(default)]
    pub unstash: Vec<String>,
}

impl Stage {
    /// Get the agent kind for this stage
    pub fn agent_kind(&self) -> &str {
        self.agent.kind()
    }

    /// Whether the guard is statically false (stage can never run)
    pub fn statically_skipped(&self) -> bool {
        matches!(self.when, Some(Guard::Never))
    }
}

/// Execution environment for a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Agent {
    /// Run directly on the host shell
    Host {
        /// Shell to use (bash, sh, etc.)
        #[serde(default = "default_shell")]
        shell: String,
    },

    /// Run inside a container image
    Container {
        /// Image reference
        image: String,

        /// Bind mounts (host:container)
        #[serde(default)]
        mounts: Vec<String>,

        /// Extra arguments passed to the container runtime
        #[serde(default)]
        args: Vec<String>,
    },
}

fn default_shell() -> String {
    "bash".to_string()
}

impl Default for Agent {
    fn default() -> Self {
        Self::Host {
            shell: default_shell(),
        }
    }
}

impl Agent {
    /// Backend registry key for this agent
    pub fn kind(&self) -> &str {
        match self {
            Self::Host { .. } => "host",
            Self::Container { .. } => "container",
        }
    }
}

/// Command lines for a stage or post step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Commands {
    /// Single command line
    Single(String),

    /// Multiple command lines, run in order
    Lines(Vec<String>),
}

impl Commands {
    /// Get the command lines in order
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Self::Single(s) => vec![s.as_str()],
            Self::Lines(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }

    /// Whether there are no command lines at all
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(s) => s.trim().is_empty(),
            Self::Lines(v) => v.is_empty() || v.iter().all(|s| s.trim().is_empty()),
        }
    }
}

/// Error policy for a stage
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Abort remaining stages on first failure (default)
    #[default]
    FailFast,
    /// Record the failure and keep going
    ContinueOnError,
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FailFast => write!(f, "fail-fast"),
            Self::ContinueOnError => write!(f, "continue-on-error"),
        }
    }
}

/// Artifact capture after a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashSpec {
    /// Key a later stage unstashes by
    pub key: String,

    /// Path patterns to capture, relative to the workspace
    pub paths: Patterns,
}

/// One or more glob patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Patterns {
    /// Single pattern
    Single(String),

    /// Multiple patterns
    Multiple(Vec<String>),
}

impl Patterns {
    /// Get the patterns as a list
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            Self::Single(s) => vec![s.as_str()],
            Self::Multiple(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }
}

/// Post-action blocks keyed by run outcome
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostActions {
    /// Run after every pipeline, regardless of outcome
    #[serde(default)]
    pub always: Vec<PostStep>,

    /// Run only after a fully successful pipeline
    #[serde(default)]
    pub success: Vec<PostStep>,

    /// Run only after a failed (or aborted) pipeline
    #[serde(default)]
    pub failure: Vec<PostStep>,
}

impl PostActions {
    /// Whether no post steps are configured at all
    pub fn is_empty(&self) -> bool {
        self.always.is_empty() && self.success.is_empty() && self.failure.is_empty()
    }
}

/// One post-action step, always run on the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostStep {
    /// Step name
    pub name: String,

    /// Shell command lines
    pub run: Commands,

    /// Environment variables for this step
    #[serde(default)]
    pub env: HashMap<String, String>,
}
