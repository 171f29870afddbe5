// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Run command - execute the pipeline

use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::artifacts::{ArtifactStore, FilesystemStore};
use crate::backend::create_default_backends;
use crate::config::RunnerConfig;
use crate::errors::{StagehandError, StagehandResult};
use crate::pipeline::{
    abort_channel, Pipeline, PipelineValidator, RunContext, Sequencer, SequencerOptions,
};
use crate::report;
use crate::utils::progress::create_spinner;

/// Run the pipeline
#[allow(clippy::too_many_arguments)]
pub async fn run(
    pipeline_path: PathBuf,
    stages: Vec<String>,
    branch: Option<String>,
    build_id: Option<u64>,
    timeout: Option<u64>,
    dry_run: bool,
    verbose: bool,
) -> StagehandResult<ExitCode> {
    if !pipeline_path.exists() {
        return Err(StagehandError::PipelineNotFound {
            path: pipeline_path,
        });
    }

    let pipeline = Pipeline::from_file(&pipeline_path)?;

    let validation = PipelineValidator::validate(&pipeline);
    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(StagehandError::InvalidPipeline {
            reason: format!("{} validation error(s)", validation.errors.len()),
            help: Some("Run 'stagehand validate' for details".to_string()),
        });
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    for name in &stages {
        if pipeline.get_stage(name).is_none() {
            return Err(StagehandError::StageNotFound { stage: name.clone() });
        }
    }

    let workspace = std::env::current_dir()?;
    let config = RunnerConfig::load(&workspace)?;
    let ctx = RunContext::from_env(branch, build_id, &workspace);

    print_plan(&pipeline, &stages);

    if dry_run {
        println!("{}", "Dry run; nothing executed.".dimmed());
        return Ok(ExitCode::SUCCESS);
    }

    // Assemble the sequencer
    let mut sequencer = Sequencer::new();
    for (kind, backend) in create_default_backends(&config.shell) {
        sequencer.register_backend(&kind, backend);
    }

    let artifacts_root = workspace.join(&config.artifacts_dir);
    let store = FilesystemStore::new(&artifacts_root)?;
    sequencer = sequencer.with_artifacts(Box::new(store));

    // Probe backends the pipeline actually needs
    let spinner = create_spinner("Checking backends...");
    let missing = sequencer.check_backends(&pipeline).await?;
    spinner.finish_and_clear();

    if !missing.is_empty() {
        eprintln!("{}", "Unavailable backends:".red().bold());
        for kind in &missing {
            eprintln!("  {} {}", "✗".red(), kind);
        }
        return Err(StagehandError::backend_unavailable(
            &missing.join(", "),
            "required by this pipeline",
        ));
    }

    // Ctrl-C aborts the run; in-flight stages are killed, post-actions run.
    let (abort_handle, abort_signal) = abort_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "Aborting run...".yellow().bold());
            abort_handle.abort();
        }
    });

    let options = SequencerOptions {
        stages,
        default_timeout: timeout.or(config.default_timeout),
        quiet: false,
    };

    let run = sequencer.run(&pipeline, &ctx, &options, abort_signal).await?;

    report::print_report(&run, config.tail_lines);

    // Artifacts are run-scoped; the namespace dies with the report.
    let cleanup = FilesystemStore::new(&artifacts_root)?;
    if let Err(e) = cleanup.clear_run(ctx.run_id()).await {
        tracing::warn!(error = %e, "failed to clear run artifacts");
    }

    if run.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

/// Print the execution plan
fn print_plan(pipeline: &Pipeline, selected: &[String]) {
    println!();
    println!("{}: {}", "Pipeline".bold(), pipeline.name);
    println!("{}", "═".repeat(50));

    for (i, stage) in pipeline.stages.iter().enumerate() {
        let mut annotations = vec![stage.agent_kind().to_string()];

        if stage.when.is_some() {
            annotations.push("guarded".to_string());
        }
        if !selected.is_empty() && !selected.contains(&stage.name) {
            annotations.push("not selected".to_string());
        }

        println!(
            "  {}. {} {}",
            i + 1,
            stage.name.bold(),
            format!("({})", annotations.join(", ")).dimmed()
        );
    }

    println!();
}
