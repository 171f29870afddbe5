// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Init command - create a starter pipeline

use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

use crate::errors::{StagehandError, StagehandResult};

const PIPELINE_FILE: &str = ".stagehand.yaml";

/// Run the init command
pub async fn run(
    name: Option<String>,
    template: Option<String>,
    verbose: bool,
) -> StagehandResult<ExitCode> {
    let project_name = name.unwrap_or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| "my-pipeline".to_string())
    });

    println!("{}", "Initializing stagehand pipeline...".bold());
    println!();

    if Path::new(PIPELINE_FILE).exists() {
        return Err(StagehandError::InvalidPipeline {
            reason: format!("{} already exists", PIPELINE_FILE),
            help: Some("Remove it first if you want a fresh pipeline".to_string()),
        });
    }

    let pipeline_content = match template.as_deref() {
        Some("docker-build") => generate_docker_template(&project_name),
        Some("services") => generate_services_template(&project_name),
        Some(t) => {
            return Err(StagehandError::InvalidPipeline {
                reason: format!("Unknown template: '{}'", t),
                help: Some(
                    "Available templates:\n\
                     • docker-build  - Build, test, and push a container image\n\
                     • services      - Multi-service build with integration tests"
                        .to_string(),
                ),
            });
        }
        None => generate_default_template(&project_name),
    };

    std::fs::write(PIPELINE_FILE, &pipeline_content).map_err(|e| {
        StagehandError::FileWriteError {
            path: PIPELINE_FILE.into(),
            error: e.to_string(),
        }
    })?;

    println!("  {} Created {}", "✓".green(), PIPELINE_FILE);
    println!();
    println!("{}", "Pipeline initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to define your stages", PIPELINE_FILE.cyan());
    println!("  2. Run {} to check it", "stagehand validate".cyan());
    println!("  3. Run {} to execute it", "stagehand run".cyan());
    println!();

    if verbose {
        println!("{}", "Generated pipeline:".dimmed());
        println!("{}", "─".repeat(50).dimmed());
        println!("{}", pipeline_content.dimmed());
    }

    Ok(ExitCode::SUCCESS)
}

fn generate_default_template(name: &str) -> String {
    format!(
        r#"# stagehand pipeline configuration

version: "1"
name: "{name}"

stages:
  - name: "build"
    run: "echo build goes here"

  - name: "test"
    run: "echo tests go here"
    on_error: continue-on-error

post:
  always:
    - name: "cleanup"
      run: "echo cleanup goes here"
"#
    )
}

fn generate_docker_template(name: &str) -> String {
    format!(
        r#"# stagehand pipeline configuration

version: "1"
name: "{name}"

env:
  IMAGE: "{name}"

stages:
  - name: "build"
    run: "docker build -t $IMAGE:$BUILD_NUMBER ."

  - name: "test"
    agent:
      type: container
      image: "{name}:test"
    run: "npm test"

  - name: "push"
    run: "docker push $IMAGE:$BUILD_NUMBER"
    when:
      branch_equals: "main"

post:
  always:
    - name: "prune"
      run: "docker image prune -f"
"#
    )
}

fn generate_services_template(name: &str) -> String {
    format!(
        r#"# stagehand pipeline configuration

version: "1"
name: "{name}"

stages:
  - name: "build"
    run:
      - "docker compose build"

  - name: "unit-tests"
    run: "docker compose run --rm tests"
    on_error: continue-on-error

  - name: "integration-tests"
    run:
      - "docker compose up -d"
      - "docker compose run --rm integration"
    timeout: 900

  - name: "push"
    run: "docker compose push"
    when:
      branch_equals: "main"

post:
  always:
    - name: "compose-down"
      run: "docker compose down --remove-orphans"
"#
    )
}
