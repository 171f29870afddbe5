// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! CLI integration tests
//!
//! Exercise the binary end to end: exit codes, report output, and the
//! side effects of real host-backend runs.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn stagehand(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stagehand").unwrap();
    cmd.current_dir(dir);
    cmd.env("NO_COLOR", "1");
    cmd
}

fn write_pipeline(dir: &Path, yaml: &str) {
    std::fs::write(dir.join(".stagehand.yaml"), yaml).unwrap();
}

#[test]
fn validate_malformed_yaml_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(dir.path(), "name: [unclosed\n");

    stagehand(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn validate_missing_file_exits_two() {
    let dir = tempfile::tempdir().unwrap();

    stagehand(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn validate_good_pipeline_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"
name: "green"
stages:
  - name: "build"
    run: "echo building"
"#,
    );

    stagehand(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid"));
}

#[test]
fn validate_duplicate_stage_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"
name: "dup"
stages:
  - name: "build"
    run: "echo one"
  - name: "build"
    run: "echo two"
"#,
    );

    stagehand(dir.path())
        .arg("validate")
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::contains("Duplicate stage name"));
}

#[test]
fn run_green_pipeline_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"
name: "green"
stages:
  - name: "hello"
    run: "echo hello from stagehand"
  - name: "goodbye"
    run: "echo goodbye"
"#,
    );

    stagehand(dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 succeeded, 0 failed, 0 skipped"));
}

#[test]
fn run_failing_pipeline_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"
name: "red"
stages:
  - name: "build"
    run: "echo ok"
  - name: "test"
    run: "exit 7"
  - name: "push"
    run: "echo never"
"#,
    );

    stagehand(dir.path())
        .arg("run")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("1 succeeded, 1 failed, 1 skipped"));
}

#[test]
fn run_post_actions_always_execute() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"
name: "posted"
stages:
  - name: "fail"
    run: "exit 1"
post:
  always:
    - name: "cleanup"
      run: "touch cleaned.marker"
  failure:
    - name: "notify"
      run: "touch failed.marker"
  success:
    - name: "celebrate"
      run: "touch celebrated.marker"
"#,
    );

    stagehand(dir.path()).arg("run").assert().failure().code(1);

    assert!(dir.path().join("cleaned.marker").exists());
    assert!(dir.path().join("failed.marker").exists());
    assert!(!dir.path().join("celebrated.marker").exists());
}

#[test]
fn run_guard_skips_stage_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"
name: "guarded"
stages:
  - name: "build"
    run: "echo building"
  - name: "deploy"
    run: "touch deployed.marker"
    when:
      branch_equals: "main"
"#,
    );

    stagehand(dir.path())
        .args(["run", "--branch", "staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 succeeded, 0 failed, 1 skipped"));

    assert!(!dir.path().join("deployed.marker").exists());
}

#[test]
fn run_stash_hands_artifacts_between_stages() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"
name: "artifacts"
stages:
  - name: "build"
    run:
      - "mkdir -p dist"
      - "echo bundle > dist/app.js"
    stash:
      - key: "dist"
        paths: "dist/*"
  - name: "publish"
    run: "cat dist/app.js"
    unstash:
      - "dist"
"#,
    );

    stagehand(dir.path())
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 succeeded"));
}

#[test]
fn run_dry_run_executes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"
name: "dry"
stages:
  - name: "build"
    run: "touch built.marker"
"#,
    );

    stagehand(dir.path())
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));

    assert!(!dir.path().join("built.marker").exists());
}

#[test]
fn run_env_reaches_stages() {
    let dir = tempfile::tempdir().unwrap();
    write_pipeline(
        dir.path(),
        r#"
name: "env"
env:
  SERVICE: "order-service"
stages:
  - name: "announce"
    run: "echo deploying $SERVICE build $BUILD_NUMBER"
"#,
    );

    stagehand(dir.path())
        .args(["run", "--build-id", "42", "--verbose"])
        .assert()
        .success();
}

#[test]
fn descriptor_valid_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("deploy.yaml"),
        r#"
name: "order-service"
image: "registry.example.com/order-service:1.4.2"
replicas: 2
ports:
  - port: 8080
env:
  - name: "DB_PASSWORD"
    secret:
      name: "order-db"
      key: "password"
"#,
    )
    .unwrap();

    stagehand(dir.path())
        .args(["descriptor", "deploy.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Descriptor is valid"));
}

#[test]
fn descriptor_zero_replicas_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("deploy.yaml"),
        r#"
name: "order-service"
image: "registry.example.com/order-service:1.4.2"
replicas: 0
"#,
    )
    .unwrap();

    stagehand(dir.path())
        .args(["descriptor", "deploy.yaml"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn init_creates_pipeline_then_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();

    stagehand(dir.path()).arg("init").assert().success();
    assert!(dir.path().join(".stagehand.yaml").exists());

    stagehand(dir.path())
        .arg("init")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn init_template_validates_cleanly() {
    let dir = tempfile::tempdir().unwrap();

    stagehand(dir.path())
        .args(["init", "demo", "--template", "services"])
        .assert()
        .success();

    stagehand(dir.path()).arg("validate").assert().success();
}
