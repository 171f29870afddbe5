// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::errors::{StagehandError, StagehandResult};
use crate::pipeline::{Pipeline, PipelineValidator};
use crate::utils::colors;

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> StagehandResult<ExitCode> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    if !pipeline_path.exists() {
        return Err(StagehandError::PipelineNotFound {
            path: pipeline_path,
        });
    }

    let pipeline = match Pipeline::from_file(&pipeline_path) {
        Ok(p) => p,
        Err(e) => {
            colors::print_error("Failed to parse pipeline");
            println!();
            return Err(e);
        }
    };

    colors::print_success("Pipeline file is valid YAML");

    let validation = PipelineValidator::validate(&pipeline);

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            colors::print_error(error);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            colors::print_warning(warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", pipeline.name);
        println!("  Stages: {}", pipeline.stages.len());
        for stage in &pipeline.stages {
            let policy = format!(" [{}]", stage.on_error);
            println!(
                "    - {} ({}){}",
                stage.name,
                stage.agent_kind(),
                policy.dimmed()
            );
        }
        if !pipeline.post.is_empty() {
            println!(
                "  Post steps: {} always, {} success, {} failure",
                pipeline.post.always.len(),
                pipeline.post.success.len(),
                pipeline.post.failure.len()
            );
        }
    }

    println!();

    if !validation.is_valid() {
        return Err(StagehandError::InvalidPipeline {
            reason: format!("{} validation error(s)", validation.errors.len()),
            help: None,
        });
    }

    if validation.has_warnings() {
        println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
    }

    Ok(ExitCode::SUCCESS)
}
