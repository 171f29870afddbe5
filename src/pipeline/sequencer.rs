// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! Pipeline sequencer
//!
//! Drives one pipeline run: stages strictly in declaration order, guard
//! evaluation, per-stage deadlines, fail-fast vs continue-on-error, and
//! the guaranteed post-action phase. The sequencer owns the PipelineRun
//! for the run's lifetime and hands it back when the run is finished.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;
use tokio::sync::watch;

use crate::artifacts::ArtifactStore;
use crate::backend::ExecutionBackend;
use crate::errors::StagehandError;
use crate::pipeline::{Agent, ErrorPolicy, Pipeline, PostStep, RunContext, Stage};

/// Outcome of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Recorded result of one stage
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Stage name
    pub stage: String,

    /// Outcome
    pub status: StageStatus,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Exit code, when a command actually ran
    pub exit_code: Option<i32>,

    /// Stage duration
    pub duration: Duration,

    /// Why the stage failed or was skipped, when not from an exit code
    pub note: Option<String>,
}

impl StageResult {
    fn succeeded(stage: &str, output: crate::backend::CommandOutput) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Succeeded,
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: Some(output.exit_code),
            duration: output.duration,
            note: None,
        }
    }

    fn failed(stage: &str, output: crate::backend::CommandOutput) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Failed,
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: Some(output.exit_code),
            duration: output.duration,
            note: None,
        }
    }

    fn failed_with_note(stage: &str, note: impl Into<String>, duration: Duration) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Failed,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            duration,
            note: Some(note.into()),
        }
    }

    fn skipped(stage: &str, note: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Skipped,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            duration: Duration::ZERO,
            note: Some(note.into()),
        }
    }
}

/// Post-action phase a step ran in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostPhase {
    Always,
    Success,
    Failure,
}

impl std::fmt::Display for PostPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Recorded result of one post step
#[derive(Debug, Clone)]
pub struct PostResult {
    /// Step name
    pub step: String,

    /// Which phase the step belongs to
    pub phase: PostPhase,

    /// Whether the step exited zero
    pub success: bool,

    /// Failure detail, when not from an exit code
    pub note: Option<String>,
}

/// Aggregate outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// Aggregated results of one pipeline run.
/// Owned by the sequencer until the run finishes.
#[derive(Debug)]
pub struct PipelineRun {
    /// Run identifier
    pub run_id: String,

    /// Per-stage results, in declaration order
    pub stages: Vec<StageResult>,

    /// Post-action results, in execution order
    pub post: Vec<PostResult>,

    /// Aggregate outcome
    pub outcome: Outcome,

    /// Whether an external abort or infrastructure failure cut the run short
    pub aborted: bool,

    /// Total run duration
    pub duration: Duration,
}

impl PipelineRun {
    /// Whether every executed stage succeeded
    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }
}

/// Sequencer state for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Pending,
    Running(usize),
    PostActions,
    Finished,
}

/// Why the stage sequence stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    FailFast,
    Aborted,
    Infrastructure,
}

impl Halt {
    fn skip_note(self) -> &'static str {
        match self {
            Self::FailFast => "earlier stage failed",
            Self::Aborted => "run aborted",
            Self::Infrastructure => "infrastructure failure",
        }
    }
}

/// Options for a sequencer run
#[derive(Debug, Clone, Default)]
pub struct SequencerOptions {
    /// Only run these stages (empty means all)
    pub stages: Vec<String>,

    /// Default per-stage deadline in seconds, when a stage names none
    pub default_timeout: Option<u64>,

    /// Suppress progress output
    pub quiet: bool,
}

/// Handle that aborts an in-flight run
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Signal the run to abort
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving side of the abort channel, held by the sequencer
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    async fn wait(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                // Sender dropped; the run can never be aborted now.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a connected abort handle/signal pair
pub fn abort_channel() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx: Arc::new(tx) }, AbortSignal { rx })
}

/// Pipeline sequencer
pub struct Sequencer {
    /// Registered backends by agent kind
    backends: HashMap<String, Box<dyn ExecutionBackend>>,

    /// Artifact store for stash/unstash
    artifacts: Option<Box<dyn ArtifactStore>>,
}

impl Sequencer {
    /// Create a new sequencer
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            artifacts: None,
        }
    }

    /// Register a backend for an agent kind
    pub fn register_backend(&mut self, kind: &str, backend: Box<dyn ExecutionBackend>) {
        self.backends.insert(kind.to_string(), backend);
    }

    /// Set the artifact store
    pub fn with_artifacts(mut self, store: Box<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(store);
        self
    }

    /// Check that every agent kind the pipeline names has a backend
    /// and that backend's runtime answers.
    pub async fn check_backends(&self, pipeline: &Pipeline) -> Result<Vec<String>, StagehandError> {
        let mut missing = Vec::new();

        let kinds: std::collections::HashSet<_> =
            pipeline.stages.iter().map(|s| s.agent_kind()).collect();

        for kind in kinds {
            match self.backends.get(kind) {
                Some(backend) => match backend.check_available().await {
                    Ok(true) => {}
                    _ => missing.push(kind.to_string()),
                },
                None => missing.push(kind.to_string()),
            }
        }

        Ok(missing)
    }

    /// Execute a pipeline run to completion, post-actions included.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        ctx: &RunContext,
        options: &SequencerOptions,
        mut abort: AbortSignal,
    ) -> Result<PipelineRun, StagehandError> {
        let start = Instant::now();
        let mut state = RunState::Pending;
        let mut results: Vec<StageResult> = Vec::with_capacity(pipeline.stages.len());
        let mut halt: Option<Halt> = None;

        tracing::info!(run_id = ctx.run_id(), pipeline = %pipeline.name, ?state, "starting run");

        for (idx, stage) in pipeline.stages.iter().enumerate() {
            state = RunState::Running(idx);
            tracing::debug!(?state, stage = %stage.name, "entering stage");

            if halt.is_none() && abort.is_aborted() {
                halt = Some(Halt::Aborted);
            }

            if let Some(reason) = halt {
                results.push(StageResult::skipped(&stage.name, reason.skip_note()));
                self.print_skipped(options, stage);
                continue;
            }

            if !options.stages.is_empty() && !options.stages.contains(&stage.name) {
                results.push(StageResult::skipped(&stage.name, "not selected"));
                continue;
            }

            let (result, stage_halt) = self.run_stage(stage, pipeline, ctx, options, &mut abort).await;
            halt = halt.or(stage_halt);
            results.push(result);
        }

        // Terminal phase: post-actions run exactly once, whatever happened.
        state = RunState::PostActions;
        tracing::debug!(?state, "entering post-actions");

        let aborted = matches!(halt, Some(Halt::Aborted | Halt::Infrastructure));
        let failed = aborted || results.iter().any(|r| r.status == StageStatus::Failed);
        let outcome = if failed { Outcome::Failed } else { Outcome::Succeeded };

        let mut post = Vec::new();
        self.run_post_steps(&pipeline.post.always, PostPhase::Always, pipeline, ctx, &mut post)
            .await;

        match outcome {
            Outcome::Succeeded => {
                self.run_post_steps(&pipeline.post.success, PostPhase::Success, pipeline, ctx, &mut post)
                    .await;
            }
            Outcome::Failed => {
                self.run_post_steps(&pipeline.post.failure, PostPhase::Failure, pipeline, ctx, &mut post)
                    .await;
            }
        }

        state = RunState::Finished;

        tracing::info!(
            run_id = ctx.run_id(),
            ?state,
            outcome = %if failed { "failed" } else { "succeeded" },
            aborted,
            "run finished"
        );

        Ok(PipelineRun {
            run_id: ctx.run_id().to_string(),
            stages: results,
            post,
            outcome,
            aborted,
            duration: start.elapsed(),
        })
    }

    /// Run one stage: guard, unstash, execute under deadline, stash.
    /// Returns the recorded result plus the halt the rest of the run
    /// should observe, if any.
    async fn run_stage(
        &self,
        stage: &Stage,
        pipeline: &Pipeline,
        ctx: &RunContext,
        options: &SequencerOptions,
        abort: &mut AbortSignal,
    ) -> (StageResult, Option<Halt>) {
        let stage_ctx = ctx.with_env_map(&pipeline.env).with_env_map(&stage.env);

        let policy_halt = |status: StageStatus| {
            (status == StageStatus::Failed && stage.on_error == ErrorPolicy::FailFast)
                .then_some(Halt::FailFast)
        };

        // Guard first: a skipped stage has no side effects at all.
        if let Some(guard) = &stage.when {
            match guard.evaluate(&stage.name, &stage_ctx) {
                Ok(true) => {}
                Ok(false) => {
                    self.print_skipped(options, stage);
                    return (
                        StageResult::skipped(&stage.name, "guard did not match"),
                        None,
                    );
                }
                Err(e) => {
                    self.print_failed(options, stage);
                    let result =
                        StageResult::failed_with_note(&stage.name, e.to_string(), Duration::ZERO);
                    let halt = policy_halt(result.status);
                    return (result, halt);
                }
            }
        }

        let stage_start = Instant::now();

        // Restore requested artifacts before any command runs.
        for key in &stage.unstash {
            let restore = match &self.artifacts {
                Some(store) => store.unstash(ctx.run_id(), key, ctx.workspace()).await.map(|_| ()),
                None => Err(StagehandError::ArtifactStore {
                    message: "no artifact store configured".to_string(),
                }),
            };

            if let Err(e) = restore {
                self.print_failed(options, stage);
                let result = StageResult::failed_with_note(
                    &stage.name,
                    e.to_string(),
                    stage_start.elapsed(),
                );
                let halt = policy_halt(result.status);
                return (result, halt);
            }
        }

        let Some(backend) = self.backends.get(stage.agent_kind()) else {
            self.print_failed(options, stage);
            let err = StagehandError::BackendNotFound {
                agent: stage.agent_kind().to_string(),
            };
            let result = StageResult::failed_with_note(
                &stage.name,
                err.to_string(),
                stage_start.elapsed(),
            );
            return (result, Some(Halt::Infrastructure));
        };

        if !options.quiet {
            print!("  {} {}...", "→".blue(), stage.name);
        }

        let env = stage_ctx.exported_env();
        let deadline = stage.timeout.or(options.default_timeout);

        let executed = self
            .execute_with_deadline(backend.as_ref(), stage, ctx.workspace(), &env, deadline, abort)
            .await;

        let (mut result, mut halt) = match executed {
            Executed::Output(output) if output.success() => {
                (StageResult::succeeded(&stage.name, output), None)
            }
            Executed::Output(output) => {
                let result = StageResult::failed(&stage.name, output);
                let halt = policy_halt(result.status);
                (result, halt)
            }
            Executed::TimedOut(secs) => {
                let err = StagehandError::StageTimeout {
                    stage: stage.name.clone(),
                    seconds: secs,
                };
                let result = StageResult::failed_with_note(
                    &stage.name,
                    err.to_string(),
                    stage_start.elapsed(),
                );
                let halt = policy_halt(result.status);
                (result, halt)
            }
            Executed::Aborted => (
                StageResult::failed_with_note(&stage.name, "run aborted", stage_start.elapsed()),
                Some(Halt::Aborted),
            ),
            Executed::Infrastructure(e) => (
                StageResult::failed_with_note(&stage.name, e.to_string(), stage_start.elapsed()),
                Some(Halt::Infrastructure),
            ),
        };

        // Capture declared artifacts only from a successful stage.
        if result.status == StageStatus::Succeeded {
            for spec in &stage.stash {
                let patterns = spec.paths.patterns();
                let stashed = match &self.artifacts {
                    Some(store) => store
                        .stash(ctx.run_id(), &spec.key, &patterns, ctx.workspace())
                        .await
                        .map(|_| ()),
                    None => Err(StagehandError::ArtifactStore {
                        message: "no artifact store configured".to_string(),
                    }),
                };

                if let Err(e) = stashed {
                    result.status = StageStatus::Failed;
                    result.note = Some(e.to_string());
                    halt = policy_halt(result.status);
                    break;
                }
            }
        }

        if !options.quiet {
            match result.status {
                StageStatus::Succeeded => println!(
                    "\r  {} {} ({:.2}s)",
                    "✓".green(),
                    stage.name.bold(),
                    result.duration.as_secs_f64()
                ),
                StageStatus::Failed => println!("\r  {} {} failed", "✗".red(), stage.name.bold()),
                StageStatus::Skipped => {}
            }
        }

        (result, halt)
    }

    /// Race the backend call against the deadline and the abort signal.
    async fn execute_with_deadline(
        &self,
        backend: &dyn ExecutionBackend,
        stage: &Stage,
        workspace: &Path,
        env: &HashMap<String, String>,
        deadline: Option<u64>,
        abort: &mut AbortSignal,
    ) -> Executed {
        let exec = backend.run(stage, workspace, env);

        match deadline {
            Some(secs) => {
                tokio::select! {
                    timed = tokio::time::timeout(Duration::from_secs(secs), exec) => match timed {
                        Ok(Ok(output)) => Executed::Output(output),
                        Ok(Err(e)) => Executed::Infrastructure(e),
                        Err(_) => Executed::TimedOut(secs),
                    },
                    _ = abort.wait() => Executed::Aborted,
                }
            }
            None => {
                tokio::select! {
                    res = exec => match res {
                        Ok(output) => Executed::Output(output),
                        Err(e) => Executed::Infrastructure(e),
                    },
                    _ = abort.wait() => Executed::Aborted,
                }
            }
        }
    }

    /// Run one phase's post steps on the host backend.
    /// Failures are recorded; nothing re-triggers.
    async fn run_post_steps(
        &self,
        steps: &[PostStep],
        phase: PostPhase,
        pipeline: &Pipeline,
        ctx: &RunContext,
        post: &mut Vec<PostResult>,
    ) {
        for step in steps {
            let env = ctx
                .with_env_map(&pipeline.env)
                .with_env_map(&step.env)
                .exported_env();

            let stage = Stage {
                name: step.name.clone(),
                description: None,
                agent: Agent::default(),
                run: step.run.clone(),
                when: None,
                on_error: ErrorPolicy::ContinueOnError,
                env: HashMap::new(),
                timeout: None,
                stash: vec![],
                unstash: vec![],
            };

            let result = match self.backends.get("host") {
                Some(backend) => match backend.run(&stage, ctx.workspace(), &env).await {
                    Ok(output) => PostResult {
                        step: step.name.clone(),
                        phase,
                        success: output.success(),
                        note: None,
                    },
                    Err(e) => PostResult {
                        step: step.name.clone(),
                        phase,
                        success: false,
                        note: Some(e.to_string()),
                    },
                },
                None => PostResult {
                    step: step.name.clone(),
                    phase,
                    success: false,
                    note: Some("no host backend registered".to_string()),
                },
            };

            if !result.success {
                tracing::warn!(step = %step.name, phase = %phase, "post step failed");
            }

            post.push(result);
        }
    }

    fn print_skipped(&self, options: &SequencerOptions, stage: &Stage) {
        if !options.quiet {
            println!("  {} {} (skipped)", "○".dimmed(), stage.name.dimmed());
        }
    }

    fn print_failed(&self, options: &SequencerOptions, stage: &Stage) {
        if !options.quiet {
            println!("  {} {} failed", "✗".red(), stage.name.bold());
        }
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// What came back from racing execution, deadline, and abort
enum Executed {
    Output(crate::backend::CommandOutput),
    TimedOut(u64),
    Aborted,
    Infrastructure(StagehandError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CommandOutput;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Backend scripted per stage name: exit codes, delays, infra failures.
    struct MockBackend {
        exit_codes: HashMap<String, i32>,
        infra_failures: HashSet<String>,
        delay: Option<Duration>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                exit_codes: HashMap::new(),
                infra_failures: HashSet::new(),
                delay: None,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(mut self, stage: &str, code: i32) -> Self {
            self.exit_codes.insert(stage.to_string(), code);
            self
        }

        fn unreachable_for(mut self, stage: &str) -> Self {
            self.infra_failures.insert(stage.to_string());
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn calls(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl ExecutionBackend for MockBackend {
        async fn run(
            &self,
            stage: &Stage,
            _working_dir: &Path,
            _env: &HashMap<String, String>,
        ) -> Result<CommandOutput, StagehandError> {
            self.calls.lock().unwrap().push(stage.name.clone());

            if self.infra_failures.contains(&stage.name) {
                return Err(StagehandError::backend_unavailable("host", "daemon gone"));
            }

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let exit_code = self.exit_codes.get(&stage.name).copied().unwrap_or(0);
            Ok(CommandOutput {
                stdout: format!("{} output", stage.name),
                stderr: String::new(),
                exit_code,
                duration: Duration::from_millis(1),
            })
        }

        async fn check_available(&self) -> Result<bool, StagehandError> {
            Ok(true)
        }

        async fn version(&self) -> Result<String, StagehandError> {
            Ok("mock".to_string())
        }

        fn validate_stage(&self, _stage: &Stage) -> Result<(), StagehandError> {
            Ok(())
        }
    }

    fn sequencer_with(backend: MockBackend) -> Sequencer {
        let mut sequencer = Sequencer::new();
        sequencer.register_backend("host", Box::new(backend));
        sequencer
    }

    fn quiet() -> SequencerOptions {
        SequencerOptions {
            quiet: true,
            ..Default::default()
        }
    }

    fn ctx() -> RunContext {
        RunContext::new("main", 1, ".")
    }

    fn statuses(run: &PipelineRun) -> Vec<StageStatus> {
        run.stages.iter().map(|r| r.status).collect()
    }

    #[tokio::test]
    async fn test_all_stages_succeed_in_order() {
        let yaml = r#"
name: "green"
stages:
  - name: "checkout"
    run: "git pull"
  - name: "build"
    run: "make"
  - name: "test"
    run: "make test"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let backend = MockBackend::new();
        let calls = backend.calls();
        let sequencer = sequencer_with(backend);

        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &ctx(), &quiet(), signal).await.unwrap();

        assert_eq!(
            statuses(&run),
            vec![StageStatus::Succeeded, StageStatus::Succeeded, StageStatus::Succeeded]
        );
        assert_eq!(run.outcome, Outcome::Succeeded);
        assert!(!run.aborted);
        assert_eq!(*calls.lock().unwrap(), vec!["checkout", "build", "test"]);
    }

    #[tokio::test]
    async fn test_fail_fast_skips_remaining() {
        let yaml = r#"
name: "red"
stages:
  - name: "build"
    run: "make"
  - name: "test"
    run: "make test"
  - name: "package"
    run: "make dist"
  - name: "push"
    run: "make push"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let backend = MockBackend::new().failing("test", 1);
        let calls = backend.calls();
        let sequencer = sequencer_with(backend);

        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &ctx(), &quiet(), signal).await.unwrap();

        assert_eq!(
            statuses(&run),
            vec![
                StageStatus::Succeeded,
                StageStatus::Failed,
                StageStatus::Skipped,
                StageStatus::Skipped
            ]
        );
        assert_eq!(run.outcome, Outcome::Failed);
        // Skipped stages never reach the backend.
        assert_eq!(*calls.lock().unwrap(), vec!["build", "test"]);
    }

    #[tokio::test]
    async fn test_continue_on_error_then_guard_false() {
        let yaml = r#"
name: "mixed"
stages:
  - name: "build"
    run: "make"
  - name: "test"
    run: "make test"
    on_error: continue-on-error
  - name: "deploy"
    run: "deploy.sh"
    when:
      branch_equals: "release"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let backend = MockBackend::new().failing("test", 2);
        let sequencer = sequencer_with(backend);

        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &ctx(), &quiet(), signal).await.unwrap();

        assert_eq!(
            statuses(&run),
            vec![StageStatus::Succeeded, StageStatus::Failed, StageStatus::Skipped]
        );
        assert_eq!(run.outcome, Outcome::Failed);
        assert_eq!(run.stages[1].exit_code, Some(2));
    }

    #[tokio::test]
    async fn test_guard_false_never_invokes_backend() {
        let yaml = r#"
name: "guarded"
stages:
  - name: "deploy"
    run: "deploy.sh"
    when:
      branch_equals: "main"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let backend = MockBackend::new();
        let calls = backend.calls();
        let sequencer = sequencer_with(backend);

        let staging = RunContext::new("staging", 1, ".");
        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &staging, &quiet(), signal).await.unwrap();

        assert_eq!(statuses(&run), vec![StageStatus::Skipped]);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(run.outcome, Outcome::Succeeded);
    }

    #[tokio::test]
    async fn test_guard_error_fails_stage_and_fail_fast_applies() {
        let yaml = r#"
name: "bad-guard"
stages:
  - name: "deploy"
    run: "deploy.sh"
    when:
      env_equals:
        var: "DEPLOY_ENV"
        value: "prod"
  - name: "announce"
    run: "announce.sh"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let backend = MockBackend::new();
        let calls = backend.calls();
        let sequencer = sequencer_with(backend);

        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &ctx(), &quiet(), signal).await.unwrap();

        assert_eq!(statuses(&run), vec![StageStatus::Failed, StageStatus::Skipped]);
        assert!(run.stages[0].note.as_ref().unwrap().contains("DEPLOY_ENV"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_always_post_actions_run_exactly_once() {
        let yaml = r#"
name: "posted"
stages:
  - name: "build"
    run: "make"
post:
  always:
    - name: "cleanup"
      run: "compose down"
  success:
    - name: "celebrate"
      run: "echo ok"
  failure:
    - name: "mourn"
      run: "echo bad"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();

        // Success path: always + success, no failure steps.
        let backend = MockBackend::new();
        let calls = backend.calls();
        let sequencer = sequencer_with(backend);
        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &ctx(), &quiet(), signal).await.unwrap();

        let cleanup_runs = calls.lock().unwrap().iter().filter(|c| *c == "cleanup").count();
        assert_eq!(cleanup_runs, 1);
        assert_eq!(run.post.len(), 2);
        assert_eq!(run.post[0].phase, PostPhase::Always);
        assert_eq!(run.post[1].phase, PostPhase::Success);

        // Failure path: always + failure.
        let backend = MockBackend::new().failing("build", 1);
        let calls = backend.calls();
        let sequencer = sequencer_with(backend);
        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &ctx(), &quiet(), signal).await.unwrap();

        let cleanup_runs = calls.lock().unwrap().iter().filter(|c| *c == "cleanup").count();
        assert_eq!(cleanup_runs, 1);
        assert!(run.post.iter().any(|p| p.phase == PostPhase::Failure));
        assert!(!run.post.iter().any(|p| p.phase == PostPhase::Success));
    }

    #[tokio::test]
    async fn test_abort_skips_everything_but_post_actions_run() {
        let yaml = r#"
name: "aborted"
stages:
  - name: "build"
    run: "make"
  - name: "test"
    run: "make test"
post:
  always:
    - name: "cleanup"
      run: "compose down"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let backend = MockBackend::new();
        let calls = backend.calls();
        let sequencer = sequencer_with(backend);

        let (handle, signal) = abort_channel();
        handle.abort();

        let run = sequencer.run(&pipeline, &ctx(), &quiet(), signal).await.unwrap();

        assert_eq!(statuses(&run), vec![StageStatus::Skipped, StageStatus::Skipped]);
        assert!(run.aborted);
        assert_eq!(run.outcome, Outcome::Failed);
        // Only the post step reached the backend.
        assert_eq!(*calls.lock().unwrap(), vec!["cleanup"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_deadline_forces_failure() {
        let yaml = r#"
name: "slow"
stages:
  - name: "hang"
    run: "sleep forever"
    timeout: 5
  - name: "after"
    run: "echo next"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let backend = MockBackend::new().with_delay(Duration::from_secs(3600));
        let sequencer = sequencer_with(backend);

        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &ctx(), &quiet(), signal).await.unwrap();

        assert_eq!(run.stages[0].status, StageStatus::Failed);
        assert!(run.stages[0].note.as_ref().unwrap().contains("deadline"));
        // Default policy is fail-fast, so the rest is skipped.
        assert_eq!(run.stages[1].status, StageStatus::Skipped);
    }

    #[tokio::test]
    async fn test_infrastructure_error_aborts_run() {
        let yaml = r#"
name: "infra"
stages:
  - name: "build"
    run: "make"
    on_error: continue-on-error
  - name: "after"
    run: "echo next"
post:
  always:
    - name: "cleanup"
      run: "compose down"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let backend = MockBackend::new().unreachable_for("build");
        let calls = backend.calls();
        let sequencer = sequencer_with(backend);

        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &ctx(), &quiet(), signal).await.unwrap();

        // Infrastructure failure overrides continue-on-error.
        assert_eq!(statuses(&run), vec![StageStatus::Failed, StageStatus::Skipped]);
        assert!(run.aborted);
        assert!(calls.lock().unwrap().contains(&"cleanup".to_string()));
    }

    #[tokio::test]
    async fn test_stash_then_unstash_through_a_run() {
        let workspace = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        std::fs::write(workspace.path().join("dist.tar"), "artifact").unwrap();

        let yaml = r#"
name: "artifacts"
stages:
  - name: "build"
    run: "make dist"
    stash:
      - key: "dist"
        paths: "dist.tar"
  - name: "publish"
    run: "push"
    unstash:
      - "dist"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let store = crate::artifacts::FilesystemStore::new(store_dir.path()).unwrap();
        let sequencer = sequencer_with(MockBackend::new()).with_artifacts(Box::new(store));

        let run_ctx = RunContext::new("main", 1, workspace.path());
        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &run_ctx, &quiet(), signal).await.unwrap();

        assert_eq!(statuses(&run), vec![StageStatus::Succeeded, StageStatus::Succeeded]);
    }

    #[tokio::test]
    async fn test_unstash_from_skipped_stage_fails() {
        let workspace = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        std::fs::write(workspace.path().join("dist.tar"), "artifact").unwrap();

        let yaml = r#"
name: "skipped-stash"
stages:
  - name: "build"
    run: "make dist"
    when:
      branch_equals: "release"
    stash:
      - key: "dist"
        paths: "dist.tar"
  - name: "publish"
    run: "push"
    unstash:
      - "dist"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let store = crate::artifacts::FilesystemStore::new(store_dir.path()).unwrap();
        let sequencer = sequencer_with(MockBackend::new()).with_artifacts(Box::new(store));

        let run_ctx = RunContext::new("main", 1, workspace.path());
        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &run_ctx, &quiet(), signal).await.unwrap();

        // The guarded stage was skipped, so its stash never happened.
        assert_eq!(run.stages[0].status, StageStatus::Skipped);
        assert_eq!(run.stages[1].status, StageStatus::Failed);
        assert!(run.stages[1].note.as_ref().unwrap().contains("dist"));
    }

    #[tokio::test]
    async fn test_stage_subset_filter() {
        let yaml = r#"
name: "subset"
stages:
  - name: "build"
    run: "make"
  - name: "test"
    run: "make test"
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        let backend = MockBackend::new();
        let calls = backend.calls();
        let sequencer = sequencer_with(backend);

        let options = SequencerOptions {
            stages: vec!["test".to_string()],
            quiet: true,
            ..Default::default()
        };

        let (_handle, signal) = abort_channel();
        let run = sequencer.run(&pipeline, &ctx(), &options, signal).await.unwrap();

        assert_eq!(statuses(&run), vec![StageStatus::Skipped, StageStatus::Succeeded]);
        assert_eq!(*calls.lock().unwrap(), vec!["test"]);
    }
}
