// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Stage guards
//!
//! A guard decides whether a stage executes. Evaluation is pure and
//! deterministic for a given run context; a guard that references an
//! undefined context variable fails, and that failure is fatal for the
//! guarded stage only.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::StagehandError;
use crate::pipeline::RunContext;

/// Condition gating whether a stage executes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    /// Run only on an exact branch
    BranchEquals(String),

    /// Run only on branches matching a regex
    BranchMatches(String),

    /// Run only if a context variable is set (unset is simply false)
    EnvSet(String),

    /// Run only if a context variable equals a value.
    /// An unset variable is an undefined reference, not a mismatch.
    EnvEquals { var: String, value: String },

    /// Run only if a file exists relative to the workspace
    FileExists(PathBuf),

    /// Negate a guard
    Not(Box<Guard>),

    /// All guards must hold
    AllOf(Vec<Guard>),

    /// At least one guard must hold
    AnyOf(Vec<Guard>),

    /// Always run (default when no guard is given)
    Always,

    /// Never run (skip)
    Never,
}

impl Guard {
    /// Evaluate this guard for a stage against the run context.
    pub fn evaluate(&self, stage: &str, ctx: &RunContext) -> Result<bool, StagehandError> {
        match self {
            Self::BranchEquals(branch) => Ok(ctx.branch() == branch),

            Self::BranchMatches(pattern) => {
                let re = regex::Regex::new(pattern).map_err(|e| {
                    StagehandError::InvalidGuardPattern {
                        stage: stage.to_string(),
                        pattern: pattern.clone(),
                        help: Some(e.to_string()),
                    }
                })?;
                Ok(re.is_match(ctx.branch()))
            }

            Self::EnvSet(var) => Ok(ctx.var(var).is_some()),

            Self::EnvEquals { var, value } => match ctx.var(var) {
                Some(actual) => Ok(actual == value),
                None => Err(StagehandError::UndefinedGuardVariable {
                    stage: stage.to_string(),
                    variable: var.clone(),
                }),
            },

            Self::FileExists(path) => Ok(ctx.workspace().join(path).exists()),

            Self::Not(inner) => Ok(!inner.evaluate(stage, ctx)?),

            Self::AllOf(guards) => {
                for guard in guards {
                    if !guard.evaluate(stage, ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }

            Self::AnyOf(guards) => {
                for guard in guards {
                    if guard.evaluate(stage, ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }

            Self::Always => Ok(true),
            Self::Never => Ok(false),
        }
    }

    /// Check regex patterns compile, without needing a context.
    /// Used at validation time so malformed guards fail before any run.
    pub fn check_patterns(&self, stage: &str) -> Result<(), StagehandError> {
        match self {
            Self::BranchMatches(pattern) => {
                regex::Regex::new(pattern).map_err(|e| StagehandError::InvalidGuardPattern {
                    stage: stage.to_string(),
                    pattern: pattern.clone(),
                    help: Some(e.to_string()),
                })?;
                Ok(())
            }
            Self::Not(inner) => inner.check_patterns(stage),
            Self::AllOf(guards) | Self::AnyOf(guards) => {
                for guard in guards {
                    guard.check_patterns(stage)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
