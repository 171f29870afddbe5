// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for stagehand.

pub mod descriptor;
pub mod init;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pipeline stage sequencer
///
/// Run declarative pipelines and validate deployment descriptors.
#[derive(Parser, Debug)]
#[clap(
    name = "stagehand",
    version,
    about = "Pipeline stage sequencer and deployment descriptor validator",
    long_about = None,
    after_help = "Examples:\n\
        stagehand init                    Create a starter pipeline\n\
        stagehand validate                Check the pipeline configuration\n\
        stagehand run                     Execute the pipeline\n\
        stagehand descriptor deploy.yaml  Validate a deployment descriptor\n\n\
        Exit codes: 0 success, 1 failed run, 2 malformed input.\n\
        See 'stagehand <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline
    Run {
        /// Pipeline file
        #[clap(short, long, default_value = ".stagehand.yaml")]
        pipeline: PathBuf,

        /// Run only specific stages
        #[clap(short, long)]
        stage: Vec<String>,

        /// Branch the run is for (defaults to $BRANCH_NAME)
        #[clap(long)]
        branch: Option<String>,

        /// Build number (defaults to $BUILD_NUMBER)
        #[clap(long)]
        build_id: Option<u64>,

        /// Default per-stage deadline in seconds
        #[clap(long)]
        timeout: Option<u64>,

        /// Show the execution plan without running anything
        #[clap(long)]
        dry_run: bool,
    },

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = ".stagehand.yaml")]
        pipeline: PathBuf,
    },

    /// Validate a deployment descriptor
    Descriptor {
        /// Descriptor file (YAML or JSON)
        file: PathBuf,
    },

    /// Create a starter pipeline
    Init {
        /// Pipeline name (defaults to current directory name)
        name: Option<String>,

        /// Use a template (docker-build, services)
        #[clap(short, long)]
        template: Option<String>,
    },
}
