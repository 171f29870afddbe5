// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! stagehand - Pipeline Stage Sequencer
//!
//! Run declarative pipelines and validate deployment descriptors.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stagehand::cli::{Cli, Commands};
use stagehand::StagehandResult;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stagehand=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    stagehand::utils::colors::init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        if let Err(e) = std::env::set_current_dir(dir) {
            eprintln!("Failed to change to directory '{}': {}", dir.display(), e);
            return ExitCode::from(2);
        }
    }

    let result: StagehandResult<ExitCode> = match cli.command {
        Commands::Run {
            pipeline,
            stage,
            branch,
            build_id,
            timeout,
            dry_run,
        } => {
            stagehand::cli::run::run(pipeline, stage, branch, build_id, timeout, dry_run, cli.verbose)
                .await
        }
        Commands::Validate { pipeline } => stagehand::cli::validate::run(pipeline, cli.verbose).await,
        Commands::Descriptor { file } => stagehand::cli::descriptor::run(file, cli.verbose).await,
        Commands::Init { name, template } => {
            stagehand::cli::init::run(name, template, cli.verbose).await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            // Malformed input is 2; a run that was attempted and failed is 1.
            let code = if e.is_config_error() { 2 } else { 1 };
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::from(code)
        }
    }
}
