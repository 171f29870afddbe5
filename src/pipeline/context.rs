// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Run context
//!
//! An immutable snapshot of the environment a pipeline run executes in.
//! Guards evaluate against it; stages receive a merged copy of its env.
//! Mutation returns a new context, so no stage observes another's changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Environment variable carrying the CI build number
pub const BUILD_NUMBER_VAR: &str = "BUILD_NUMBER";
/// Environment variable carrying the branch under build
pub const BRANCH_VAR: &str = "BRANCH_NAME";
/// Environment variable carrying the registry credentials reference key.
/// Only the reference is ever read, never the secret value itself.
pub const REGISTRY_CREDENTIALS_VAR: &str = "REGISTRY_CREDENTIALS_ID";

/// Immutable snapshot of a run's environment
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Unique run identifier (namespaces artifacts)
    run_id: String,

    /// Branch under build
    branch: String,

    /// CI build number
    build_number: u64,

    /// Workspace the run executes in
    workspace: PathBuf,

    /// Frozen environment mapping
    env: HashMap<String, String>,
}

impl RunContext {
    /// Create a context with a fresh run id
    pub fn new(branch: impl Into<String>, build_number: u64, workspace: impl Into<PathBuf>) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            branch: branch.into(),
            build_number,
            workspace: workspace.into(),
            env: HashMap::new(),
        }
    }

    /// Build a context from the process environment, with CLI overrides
    /// taking precedence over CI-provided variables.
    pub fn from_env(
        branch_override: Option<String>,
        build_override: Option<u64>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        let branch = branch_override
            .or_else(|| std::env::var(BRANCH_VAR).ok())
            .unwrap_or_else(|| "main".to_string());

        let build_number = build_override
            .or_else(|| std::env::var(BUILD_NUMBER_VAR).ok().and_then(|v| v.parse().ok()))
            .unwrap_or(0);

        let mut ctx = Self::new(branch, build_number, workspace);

        // Pass the credentials *reference* through; the value stays in CI.
        if let Ok(cred_ref) = std::env::var(REGISTRY_CREDENTIALS_VAR) {
            ctx = ctx.with_env(REGISTRY_CREDENTIALS_VAR, cred_ref);
        }

        ctx
    }

    /// Run identifier
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Branch under build
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// CI build number
    pub fn build_number(&self) -> u64 {
        self.build_number
    }

    /// Workspace directory
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Look up a context variable
    pub fn var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    /// Return a new context with one variable added
    pub fn with_env(&self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.env.insert(name.into(), value.into());
        next
    }

    /// Return a new context with a whole mapping merged in
    pub fn with_env_map(&self, vars: &HashMap<String, String>) -> Self {
        let mut next = self.clone();
        next.env.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        next
    }

    /// The environment a stage process receives: the frozen mapping plus
    /// the well-known run variables.
    pub fn exported_env(&self) -> HashMap<String, String> {
        let mut env = self.env.clone();
        env.insert("STAGEHAND_RUN_ID".to_string(), self.run_id.clone());
        env.insert(BRANCH_VAR.to_string(), self.branch.clone());
        env.insert(BUILD_NUMBER_VAR.to_string(), self.build_number.to_string());
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_env_returns_new_context() {
        let ctx = RunContext::new("main", 7, "/tmp/ws");
        let next = ctx.with_env("DEPLOY_ENV", "staging");

        assert!(ctx.var("DEPLOY_ENV").is_none());
        assert_eq!(next.var("DEPLOY_ENV"), Some("staging"));
        assert_eq!(next.branch(), "main");
        assert_eq!(next.run_id(), ctx.run_id());
    }

    #[test]
    fn test_exported_env_carries_run_variables() {
        let ctx = RunContext::new("release/1.2", 42, "/tmp/ws");
        let env = ctx.exported_env();

        assert_eq!(env.get(BRANCH_VAR).unwrap(), "release/1.2");
        assert_eq!(env.get(BUILD_NUMBER_VAR).unwrap(), "42");
        assert_eq!(env.get("STAGEHAND_RUN_ID").unwrap(), ctx.run_id());
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunContext::new("main", 1, ".");
        let b = RunContext::new("main", 1, ".");
        assert_ne!(a.run_id(), b.run_id());
    }
}
