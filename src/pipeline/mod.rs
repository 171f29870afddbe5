// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Pipeline definitions and execution
//!
//! This module defines the core data structures for stagehand pipelines
//! (stages, agents, guards, post-actions) and the sequencer that drives
//! a run.

mod context;
mod definition;
mod guard;
mod sequencer;
mod validation;

pub use context::{RunContext, BRANCH_VAR, BUILD_NUMBER_VAR, REGISTRY_CREDENTIALS_VAR};
pub use definition::*;
pub use guard::Guard;
pub use sequencer::{
    abort_channel, AbortHandle, AbortSignal, Outcome, PipelineRun, PostPhase, PostResult,
    Sequencer, SequencerOptions, StageResult, StageStatus,
};
pub use validation::{PipelineValidator, ValidationResult};
