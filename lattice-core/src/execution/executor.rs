// Run Executor
// Expands the matrix and runs the resulting jobs concurrently

use crate::config::models::MatrixConfig;
use crate::deploy::{DryRunUploader, ReleaseUploader, RunTrigger};
use crate::error::{CoreError, CoreResult};
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::job::{JobResult, JobStatus, StageRunner};
use crate::execution::matrix::MatrixExpander;
use crate::runners::{CommandRunner, ShellRunner};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Environment keys assembled per job by the expander; runtime overrides
/// of these would silently change which job a command believes it is in.
const RESERVED_ENV_KEYS: [&str; 4] = ["CI_OS_NAME", "CI_RUST_VERSION", "CI_TAG", "TARGET"];

/// Run-scoped inputs, immutable for the duration of the run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// What triggered this run; tag runs enable the deploy gate
    pub trigger: RunTrigger,
    /// Working directory for every stage command
    pub working_dir: PathBuf,
}

impl RunContext {
    pub fn new(trigger: RunTrigger, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            trigger,
            working_dir: working_dir.into(),
        }
    }
}

/// Aggregate outcome of a run
#[derive(Debug)]
pub struct RunResult {
    /// Per-job results, in declaration order
    pub jobs: Vec<JobResult>,
    /// True when every job's mandatory stages succeeded
    pub success: bool,
    pub duration: Duration,
}

impl RunResult {
    /// Orchestrator process exit code: 0 on success, 1 otherwise.
    /// Deploy-stage failures are reported but never change this.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            0
        } else {
            1
        }
    }

    pub fn failed_jobs(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Failed)
            .count()
    }
}

/// Executor for a whole matrix run.
///
/// Jobs are mutually independent and run concurrently, bounded by a
/// semaphore; within one job the stage runner keeps stages strictly
/// sequential.
pub struct RunExecutor {
    config: Arc<MatrixConfig>,
    runner: Arc<dyn CommandRunner>,
    uploader: Arc<dyn ReleaseUploader>,
    events: Option<ProgressSender>,
    max_parallel: Option<usize>,
    /// Extra variables layered over every job's environment (CLI overrides)
    extra_env: HashMap<String, String>,
}

impl RunExecutor {
    /// Create an executor with the default collaborators: the platform
    /// shell runner and a dry-run uploader (real uploads are opt-in).
    pub fn new(config: MatrixConfig) -> Self {
        Self {
            config: Arc::new(config),
            runner: Arc::new(ShellRunner::new()),
            uploader: Arc::new(DryRunUploader::new()),
            events: None,
            max_parallel: None,
            extra_env: HashMap::new(),
        }
    }

    /// Substitute the command runner collaborator
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Substitute the release-upload collaborator
    pub fn with_uploader(mut self, uploader: Arc<dyn ReleaseUploader>) -> Self {
        self.uploader = uploader;
        self
    }

    /// Stream progress events to the given sender
    pub fn with_progress(mut self, events: ProgressSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Bound the number of concurrently running jobs
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel.max(1));
        self
    }

    /// Layer extra variables over every job's environment
    pub fn with_extra_env(mut self, extra_env: HashMap<String, String>) -> Self {
        self.extra_env = extra_env;
        self
    }

    /// Expand the matrix and run every job. Configuration errors abort
    /// before any job starts; job failures never abort sibling jobs.
    pub async fn execute(&self, ctx: RunContext) -> CoreResult<RunResult> {
        let start = Instant::now();

        // Extra variables must not shadow the keys the expander owns.
        for key in self.extra_env.keys() {
            if RESERVED_ENV_KEYS.contains(&key.as_str()) {
                return Err(CoreError::DuplicateEnvKey { key: key.clone() });
            }
        }

        let mut jobs = MatrixExpander::expand(&self.config, &ctx.trigger)?;
        for job in &mut jobs {
            job.env
                .extend(self.extra_env.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        self.events.send_event(ExecutionEvent::run_started(
            &self.config.project,
            jobs.len(),
            ctx.trigger.tag().map(str::to_string),
        ));

        let limit = self.max_parallel.unwrap_or_else(|| jobs.len().max(1));
        let semaphore = Arc::new(Semaphore::new(limit));
        let ctx = Arc::new(ctx);

        let mut tasks = JoinSet::new();
        for job in jobs {
            let semaphore = semaphore.clone();
            let ctx = ctx.clone();
            let events = self.events.clone();
            let stage_runner = StageRunner::new(
                self.config.clone(),
                self.runner.clone(),
                self.uploader.clone(),
                self.events.clone(),
            );

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore open");

                events.send_event(ExecutionEvent::JobStarted {
                    job_name: job.name.clone(),
                    index: job.index,
                });

                let result = stage_runner.run_job(&job, &ctx).await;

                events.send_event(ExecutionEvent::JobCompleted {
                    job_name: result.job_name.clone(),
                    index: result.index,
                    status: result.status,
                    duration: result.duration,
                });

                result
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| CoreError::Io(std::io::Error::other(e)))?;
            results.push(result);
        }

        // Jobs finish in any order; reports use declaration order.
        results.sort_by_key(|r| r.index);

        let success = results.iter().all(|r| r.status == JobStatus::Succeeded);
        let duration = start.elapsed();

        self.events.send_event(ExecutionEvent::RunCompleted {
            success,
            failed_jobs: results
                .iter()
                .filter(|r| r.status == JobStatus::Failed)
                .count(),
            duration,
        });

        Ok(RunResult {
            jobs: results,
            success,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn ctx() -> RunContext {
        RunContext::new(RunTrigger::Branch, std::env::current_dir().unwrap())
    }

    #[tokio::test]
    async fn test_all_jobs_succeed() {
        let config = ConfigParser::parse(
            r#"
project: p
matrix:
  - os: linux
    channel: stable
  - os: linux
    channel: nightly
script:
  - echo ok
"#,
        )
        .unwrap();

        let result = RunExecutor::new(config).execute(ctx()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code(), 0);
        assert_eq!(result.jobs.len(), 2);
        assert_eq!(result.jobs[0].index, 0);
        assert_eq!(result.jobs[1].index, 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_siblings() {
        let config = ConfigParser::parse(
            r#"
project: p
matrix:
  - os: linux
    channel: stable
    script:
      - exit 2
  - os: linux
    channel: nightly
script:
  - echo ok
"#,
        )
        .unwrap();

        let result = RunExecutor::new(config).execute(ctx()).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code(), 1);
        assert_eq!(result.failed_jobs(), 1);
        assert_eq!(result.jobs[0].status, JobStatus::Failed);
        // The sibling still ran to completion
        assert_eq!(result.jobs[1].status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_expansion_error_aborts_before_any_job() {
        let config = ConfigParser::parse(
            r#"
project: p
matrix:
  - os: linux
script:
  - echo never
"#,
        )
        .unwrap();

        let err = RunExecutor::new(config).execute(ctx()).await.unwrap_err();
        assert!(matches!(err, CoreError::MalformedMatrixEntry { .. }));
    }

    #[tokio::test]
    async fn test_extra_env_overlays_jobs() {
        let config = ConfigParser::parse(
            r#"
project: p
matrix:
  - os: linux
    channel: stable
script:
  - run: echo ran
    when: "$EXTRA = yes"
"#,
        )
        .unwrap();

        let mut extra = HashMap::new();
        extra.insert("EXTRA".to_string(), "yes".to_string());

        let result = RunExecutor::new(config)
            .with_extra_env(extra)
            .execute(ctx())
            .await
            .unwrap();

        assert!(result.success);
        let script = &result.jobs[0].stages[0];
        assert!(script.stdout.contains("ran"));
    }

    #[tokio::test]
    async fn test_extra_env_rejects_reserved_keys() {
        let config = ConfigParser::parse(
            r#"
project: p
matrix:
  - os: linux
    channel: stable
    target: x86_64-unknown-linux-gnu
script:
  - echo never
"#,
        )
        .unwrap();

        let mut extra = HashMap::new();
        extra.insert("TARGET".to_string(), "spoofed".to_string());

        let err = RunExecutor::new(config)
            .with_extra_env(extra)
            .execute(ctx())
            .await
            .unwrap_err();
        match err {
            CoreError::DuplicateEnvKey { key } => assert_eq!(key, "TARGET"),
            other => panic!("expected DuplicateEnvKey, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_max_parallel_serializes_jobs() {
        let config = ConfigParser::parse(
            r#"
project: p
matrix:
  - os: linux
    channel: stable
  - os: linux
    channel: beta
  - os: linux
    channel: nightly
script:
  - echo ok
"#,
        )
        .unwrap();

        let result = RunExecutor::new(config)
            .with_max_parallel(1)
            .execute(ctx())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.jobs.len(), 3);
    }
}
