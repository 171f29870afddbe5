// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Run report rendering
//!
//! The final report: each stage's outcome and timing, the tail of
//! captured output for failed stages, post-action results, and the
//! aggregate outcome.

use colored::Colorize;

use crate::pipeline::{PipelineRun, StageStatus};

/// How many trailing output lines a failed stage shows by default
pub const DEFAULT_TAIL_LINES: usize = 20;

/// Counts of stage outcomes in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    /// Tally a run's stage outcomes
    pub fn of(run: &PipelineRun) -> Self {
        let mut summary = Self {
            succeeded: 0,
            failed: 0,
            skipped: 0,
        };

        for result in &run.stages {
            match result.status {
                StageStatus::Succeeded => summary.succeeded += 1,
                StageStatus::Failed => summary.failed += 1,
                StageStatus::Skipped => summary.skipped += 1,
            }
        }

        summary
    }
}

/// Last `n` lines of a text block
pub fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Print the final run report
pub fn print_report(run: &PipelineRun, tail_lines: usize) {
    println!();
    crate::utils::colors::print_header("Run report");

    for result in &run.stages {
        let glyph = match result.status {
            StageStatus::Succeeded => "✓".green(),
            StageStatus::Failed => "✗".red(),
            StageStatus::Skipped => "○".dimmed(),
        };

        let timing = match result.status {
            StageStatus::Skipped => String::new(),
            _ => format!(" ({:.2}s)", result.duration.as_secs_f64()),
        };

        println!("  {} {} {}{}", glyph, result.stage.bold(), result.status, timing.dimmed());

        if let Some(note) = &result.note {
            println!("      {}", note.dimmed());
        }

        if result.status == StageStatus::Failed {
            let stderr_tail = tail(&result.stderr, tail_lines);
            if !stderr_tail.is_empty() {
                for line in stderr_tail.lines() {
                    println!("      {}", line.red().dimmed());
                }
            } else {
                let stdout_tail = tail(&result.stdout, tail_lines);
                for line in stdout_tail.lines() {
                    println!("      {}", line.dimmed());
                }
            }
        }
    }

    if !run.post.is_empty() {
        println!();
        println!("{}:", "Post-actions".bold());
        for post in &run.post {
            let glyph = if post.success { "✓".green() } else { "✗".red() };
            println!("  {} {} [{}]", glyph, post.step, post.phase);
            if let Some(note) = &post.note {
                println!("      {}", note.dimmed());
            }
        }
    }

    let summary = RunSummary::of(run);

    println!();
    let line = format!(
        "{} succeeded, {} failed, {} skipped in {:.2}s",
        summary.succeeded,
        summary.failed,
        summary.skipped,
        run.duration.as_secs_f64()
    );

    if run.succeeded() {
        println!("{}", line.green().bold());
    } else if run.aborted {
        println!("{}", format!("{} (aborted)", line).red().bold());
    } else {
        println!("{}", line.red().bold());
    }
}
