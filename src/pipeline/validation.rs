// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Pipeline validation
//!
//! Validates pipeline configuration before execution.

use std::collections::HashSet;

use crate::pipeline::{Agent, Guard, Pipeline, Stage};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline configuration
    pub fn validate(pipeline: &Pipeline) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pipeline.name.trim().is_empty() {
            result.add_error("Pipeline name is empty");
        }

        if pipeline.stages.is_empty() {
            result.add_error("Pipeline has no stages defined");
        }

        // Stage names must be unique and non-empty
        let mut seen_names = HashSet::new();
        for stage in &pipeline.stages {
            if stage.name.trim().is_empty() {
                result.add_error("A stage has an empty name");
            }
            if !seen_names.insert(&stage.name) {
                result.add_error(&format!("Duplicate stage name: '{}'", stage.name));
            }
        }

        // Validate each stage, tracking which stash keys exist so far
        let mut stashed_keys: HashSet<&str> = HashSet::new();
        let mut guarded_stash_keys: HashSet<&str> = HashSet::new();

        for stage in &pipeline.stages {
            Self::validate_stage(stage, &mut result);

            for key in &stage.unstash {
                if !stashed_keys.contains(key.as_str()) {
                    result.add_error(&format!(
                        "Stage '{}': unstash '{}' but no earlier stage stashes it",
                        stage.name, key
                    ));
                } else if guarded_stash_keys.contains(key.as_str()) {
                    result.add_warning(&format!(
                        "Stage '{}': unstash '{}' comes from a guarded stage that may be \
                         skipped at runtime",
                        stage.name, key
                    ));
                }
            }

            for spec in &stage.stash {
                if !stashed_keys.insert(&spec.key) {
                    result.add_warning(&format!(
                        "Stage '{}': stash key '{}' is reused; the later stash wins",
                        stage.name, spec.key
                    ));
                }
                if stage.when.is_some() && !stage.statically_skipped() {
                    guarded_stash_keys.insert(&spec.key);
                }
            }
        }

        // Post steps need names and commands
        for step in pipeline
            .post
            .always
            .iter()
            .chain(&pipeline.post.success)
            .chain(&pipeline.post.failure)
        {
            if step.name.trim().is_empty() {
                result.add_error("A post step has an empty name");
            }
            if step.run.is_empty() {
                result.add_error(&format!("Post step '{}': command list is empty", step.name));
            }
        }

        result
    }

    /// Validate a single stage
    fn validate_stage(stage: &Stage, result: &mut ValidationResult) {
        // Empty commands are only legal when the guard can never pass
        if stage.run.is_empty() && !stage.statically_skipped() {
            result.add_error(&format!("Stage '{}': command list is empty", stage.name));
        }

        if let Some(guard) = &stage.when {
            if let Err(e) = guard.check_patterns(&stage.name) {
                result.add_error(&e.to_string());
            }
            if matches!(guard, Guard::Never) && !stage.run.is_empty() {
                result.add_warning(&format!(
                    "Stage '{}': guard is 'never'; the stage will always be skipped",
                    stage.name
                ));
            }
        }

        match &stage.agent {
            Agent::Host { shell } => {
                if shell.trim().is_empty() {
                    result.add_error(&format!("Stage '{}': shell is empty", stage.name));
                }
            }
            Agent::Container { image, mounts, .. } => {
                if image.trim().is_empty() {
                    result.add_error(&format!("Stage '{}': container image is empty", stage.name));
                }
                for mount in mounts {
                    if !mount.contains(':') {
                        result.add_error(&format!(
                            "Stage '{}': mount '{}' is not host:container form",
                            stage.name, mount
                        ));
                    }
                }
            }
        }

        if stage.timeout == Some(0) {
            result.add_error(&format!("Stage '{}': timeout of 0 seconds", stage.name));
        }

        for spec in &stage.stash {
            if spec.key.trim().is_empty() {
                result.add_error(&format!("Stage '{}': stash key is empty", stage.name));
            }
            if spec.paths.patterns().is_empty() {
                result.add_error(&format!(
                    "Stage '{}': stash '{}' has no path patterns",
                    stage.name, spec.key
                ));
            }
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
