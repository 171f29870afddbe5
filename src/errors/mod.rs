// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Error types
//!
//! One taxonomy for the whole tool. Stage-level failures (non-zero exits)
//! are not errors; they are recorded in the run report. Errors here are
//! configuration problems, guard problems, and infrastructure failures.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for stagehand operations
pub type StagehandResult<T> = Result<T, StagehandError>;

/// Main error type for stagehand
#[derive(Error, Debug, Diagnostic)]
pub enum StagehandError {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors (exit code 2 — no run attempted)
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(stagehand::pipeline_not_found),
        help("Create a pipeline with 'stagehand init' or create .stagehand.yaml manually")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(stagehand::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Stage '{stage}' is invalid: {reason}")]
    #[diagnostic(code(stagehand::invalid_stage))]
    InvalidStage { stage: String, reason: String },

    #[error("Duplicate stage name: '{stage}'")]
    #[diagnostic(
        code(stagehand::duplicate_stage),
        help("Stage names must be unique within a pipeline")
    )]
    DuplicateStage { stage: String },

    #[error("Stage '{stage}' not found in pipeline")]
    #[diagnostic(code(stagehand::stage_not_found))]
    StageNotFound { stage: String },

    #[error("Descriptor file not found: {path}")]
    #[diagnostic(code(stagehand::descriptor_not_found))]
    DescriptorNotFound { path: PathBuf },

    #[error("Invalid deployment descriptor: {reason}")]
    #[diagnostic(code(stagehand::invalid_descriptor))]
    InvalidDescriptor {
        reason: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Guard Errors (fatal for the guarded stage only)
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Guard on stage '{stage}' references undefined variable '{variable}'")]
    #[diagnostic(
        code(stagehand::undefined_guard_variable),
        help("Define '{variable}' in the pipeline env block or the run context")
    )]
    UndefinedGuardVariable { stage: String, variable: String },

    #[error("Guard on stage '{stage}' has an invalid pattern: {pattern}")]
    #[diagnostic(code(stagehand::invalid_guard_pattern))]
    InvalidGuardPattern {
        stage: String,
        pattern: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("No backend registered for agent '{agent}'")]
    #[diagnostic(
        code(stagehand::backend_not_found),
        help("Available backends: host, container")
    )]
    BackendNotFound { agent: String },

    #[error("Backend '{backend}' is unavailable: {message}")]
    #[diagnostic(code(stagehand::infrastructure))]
    Infrastructure {
        backend: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Stage '{stage}' exceeded its deadline of {seconds}s")]
    #[diagnostic(
        code(stagehand::stage_timeout),
        help("Raise the stage 'timeout' field or the --timeout default")
    )]
    StageTimeout { stage: String, seconds: u64 },

    // ─────────────────────────────────────────────────────────────────────────
    // Artifact Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("No artifact stashed under key '{key}' in this run")]
    #[diagnostic(
        code(stagehand::artifact_not_found),
        help("A stage must stash '{key}' before a later stage can unstash it")
    )]
    ArtifactNotFound { key: String },

    #[error("Artifact store error: {message}")]
    #[diagnostic(code(stagehand::artifact_store))]
    ArtifactStore { message: String },

    #[error("No files matched stash pattern: {pattern}")]
    #[diagnostic(
        code(stagehand::no_stash_matches),
        help("Check that the stage produced files matching '{pattern}'")
    )]
    NoStashMatches { pattern: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(stagehand::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(stagehand::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(stagehand::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(stagehand::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(stagehand::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(stagehand::toml_error))]
    Toml { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(stagehand::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for StagehandError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for StagehandError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for StagehandError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for StagehandError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<glob::PatternError> for StagehandError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl StagehandError {
    /// Whether this error means the input was malformed (CLI exit code 2)
    /// rather than a run that was attempted and failed (exit code 1).
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::PipelineNotFound { .. }
                | Self::InvalidPipeline { .. }
                | Self::InvalidStage { .. }
                | Self::DuplicateStage { .. }
                | Self::StageNotFound { .. }
                | Self::InvalidGuardPattern { .. }
                | Self::DescriptorNotFound { .. }
                | Self::InvalidDescriptor { .. }
                | Self::Yaml { .. }
                | Self::Json { .. }
                | Self::Toml { .. }
        )
    }

    /// Create an infrastructure error for a backend with a hint
    pub fn backend_unavailable(backend: &str, message: impl Into<String>) -> Self {
        let help = match backend {
            "container" => Some("Check that the container daemon is running and on PATH".to_string()),
            "host" => Some("Check that the configured shell exists".to_string()),
            _ => None,
        };

        Self::Infrastructure {
            backend: backend.to_string(),
            message: message.into(),
            help,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_map_to_exit_two() {
        let err = StagehandError::Yaml { message: "bad".into() };
        assert!(err.is_config_error());

        let err = StagehandError::DuplicateStage { stage: "build".into() };
        assert!(err.is_config_error());
    }

    #[test]
    fn test_run_errors_are_not_config_errors() {
        let err = StagehandError::StageTimeout { stage: "test".into(), seconds: 30 };
        assert!(!err.is_config_error());

        let err = StagehandError::ArtifactNotFound { key: "dist".into() };
        assert!(!err.is_config_error());
    }
}
