// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Descriptor command - validate a deployment descriptor

use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::descriptor::{Descriptor, DescriptorValidator};
use crate::errors::{StagehandError, StagehandResult};
use crate::utils::colors;

/// Run the descriptor command
pub async fn run(file: PathBuf, verbose: bool) -> StagehandResult<ExitCode> {
    println!("{}", "Validating deployment descriptor...".bold());
    println!();

    let descriptor = Descriptor::from_file(&file)?;

    colors::print_success("Descriptor parses");

    let validation = DescriptorValidator::validate(&descriptor);

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
        println!("{}:", "Descriptor summary".bold());
        println!("  Name: {}", descriptor.name);
        println!("  Image: {}", descriptor.image);
        println!("  Replicas: {}", descriptor.replicas);
        for port in &descriptor.ports {
            println!("  Port: {}", port.port);
        }
        println!("  Env entries: {}", descriptor.env.len());
    }

    println!();

    if !validation.is_valid() {
        return Err(StagehandError::InvalidDescriptor {
            reason: format!("{} validation error(s)", validation.errors.len()),
            help: None,
        });
    }

    if validation.has_warnings() {
        println!("{}", "Descriptor is valid but has warnings.".yellow().bold());
    } else {
        println!("{}", "Descriptor is valid!".green().bold());
    }

    Ok(ExitCode::SUCCESS)
}
