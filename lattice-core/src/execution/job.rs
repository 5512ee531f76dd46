// Stage Runner
// Runs one job's staged lifecycle with fail-fast mandatory stages

use crate::config::models::{MatrixConfig, Stage, StageStatus, Step};
use crate::deploy::{DeployGate, ReleaseUploader};
use crate::error::CoreError;
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::executor::RunContext;
use crate::execution::matrix::JobSpec;
use crate::expression;
use crate::runners::{CommandRunner, OutputSink};

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Final status of one job. Only mandatory stages can fail a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed,
}

/// Outcome of one stage. Created once per executed stage, never mutated.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: Stage,
    pub status: StageStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
    /// Why the stage (or all of its steps) was skipped or failed outside
    /// of a command exit
    pub reason: Option<String>,
}

impl StageResult {
    fn skipped(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
            reason: Some(reason.into()),
        }
    }
}

/// Outcome of one job
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_name: String,
    pub index: usize,
    pub status: JobStatus,
    pub stages: Vec<StageResult>,
    pub duration: Duration,
}

impl JobResult {
    /// The mandatory stage that failed this job, if any
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.stages
            .iter()
            .find(|s| s.stage.is_mandatory() && s.status == StageStatus::Failed)
    }

    /// The failure as a core error, for reporting
    pub fn failure(&self) -> Option<CoreError> {
        self.failed_stage().map(|s| CoreError::StageFailed {
            stage: s.stage,
            exit_code: s.exit_code.unwrap_or(-1),
        })
    }
}

/// Executes the fixed stage sequence for a single job.
///
/// Operates only on job-local state: the job's own environment copy and
/// shared read-only configuration. Nothing here is shared mutably across
/// jobs.
pub struct StageRunner {
    config: Arc<MatrixConfig>,
    runner: Arc<dyn CommandRunner>,
    uploader: Arc<dyn ReleaseUploader>,
    events: Option<ProgressSender>,
}

impl StageRunner {
    pub fn new(
        config: Arc<MatrixConfig>,
        runner: Arc<dyn CommandRunner>,
        uploader: Arc<dyn ReleaseUploader>,
        events: Option<ProgressSender>,
    ) -> Self {
        Self {
            config,
            runner,
            uploader,
            events,
        }
    }

    /// Run all stages for one job. A non-zero exit in a mandatory stage
    /// aborts the remaining stages; before_deploy/deploy failures are
    /// recorded but never fail the job.
    pub async fn run_job(&self, job: &JobSpec, ctx: &RunContext) -> JobResult {
        let start = Instant::now();
        let mut stages: Vec<StageResult> = Vec::new();
        let mut status = JobStatus::Succeeded;

        // One gate decision per job, computed up front; it covers
        // before_deploy as well since that stage only exists to prepare
        // artifacts for a firing deploy.
        let gate = self
            .config
            .deploy
            .as_ref()
            .map(|d| DeployGate::new(&self.config.project, &d.on.channel));
        let decision = gate
            .as_ref()
            .map(|g| g.evaluate(&ctx.trigger, &job.channel, job.target.as_deref()));

        for stage in Stage::ORDER {
            match stage {
                Stage::BeforeInstall | Stage::Install | Stage::Script | Stage::BeforeDeploy => {
                    if stage == Stage::BeforeDeploy {
                        let firing = decision.as_ref().map(|d| d.fire).unwrap_or(false);
                        if !firing {
                            if !self.config.before_deploy.is_empty() {
                                let reason = decision
                                    .as_ref()
                                    .map(|d| d.reason.clone())
                                    .unwrap_or_else(|| "no deploy configured".to_string());
                                self.events.send_event(ExecutionEvent::stage_skipped(
                                    &job.name, stage, &reason,
                                ));
                                stages.push(StageResult::skipped(stage, reason));
                            }
                            continue;
                        }
                    }

                    let steps = self.steps_for(stage, job);
                    if steps.is_empty() {
                        continue;
                    }

                    let result = self.run_stage(stage, steps, job, ctx).await;
                    let failed = result.status == StageStatus::Failed;
                    stages.push(result);

                    if failed && stage.is_mandatory() {
                        status = JobStatus::Failed;
                        break;
                    }
                }
                Stage::Deploy => {
                    if let (Some(gate), Some(decision)) = (&gate, &decision) {
                        let result = self.run_deploy(gate, decision, job, ctx).await;
                        if let Some(result) = result {
                            stages.push(result);
                        }
                    }
                }
            }
        }

        JobResult {
            job_name: job.name.clone(),
            index: job.index,
            status,
            stages,
            duration: start.elapsed(),
        }
    }

    /// Resolve the step list for a stage: per-job override where one is
    /// declared and non-empty, else the global default.
    fn steps_for<'a>(&'a self, stage: Stage, job: &'a JobSpec) -> &'a [Step] {
        match stage {
            Stage::Install => job
                .install_override()
                .unwrap_or_else(|| self.config.default_steps(stage)),
            Stage::Script => job
                .script_override()
                .unwrap_or_else(|| self.config.default_steps(stage)),
            _ => self.config.default_steps(stage),
        }
    }

    async fn run_stage(
        &self,
        stage: Stage,
        steps: &[Step],
        job: &JobSpec,
        ctx: &RunContext,
    ) -> StageResult {
        let start = Instant::now();
        self.events.send_event(ExecutionEvent::StageStarted {
            job_name: job.name.clone(),
            stage,
        });

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut executed = 0usize;
        let mut last_skip_reason = None;
        let mut failure: Option<i32> = None;

        for step in steps {
            // Gated steps consult the condition evaluator; a false result
            // or an unbound variable skips the step, never the run.
            if let Some(when) = step.when() {
                match expression::evaluate(when, &job.env) {
                    Ok(true) => {}
                    Ok(false) => {
                        let reason = format!("condition '{}' evaluated to false", when);
                        self.events
                            .send_event(ExecutionEvent::stage_skipped(&job.name, stage, &reason));
                        last_skip_reason = Some(reason);
                        continue;
                    }
                    Err(e) => {
                        let reason = format!("condition '{}' not evaluated: {}", when, e);
                        self.events
                            .send_event(ExecutionEvent::stage_skipped(&job.name, stage, &reason));
                        last_skip_reason = Some(reason);
                        continue;
                    }
                }
            }

            executed += 1;
            let output = self
                .runner
                .run(
                    step.run(),
                    &job.env,
                    &ctx.working_dir,
                    self.output_sink(&job.name, stage),
                )
                .await;

            if !output.stdout.is_empty() {
                if !stdout.is_empty() {
                    stdout.push('\n');
                }
                stdout.push_str(&output.stdout);
            }
            if !output.stderr.is_empty() {
                if !stderr.is_empty() {
                    stderr.push('\n');
                }
                stderr.push_str(&output.stderr);
            }

            let exit_code = output.exit_code.unwrap_or(-1);
            if exit_code != 0 {
                failure = Some(exit_code);
                break;
            }
        }

        let (status, exit_code, reason) = match failure {
            Some(code) => (StageStatus::Failed, Some(code), None),
            None if executed == 0 => (StageStatus::Skipped, None, last_skip_reason),
            None => (StageStatus::Succeeded, Some(0), None),
        };

        let duration = start.elapsed();
        self.events.send_event(ExecutionEvent::StageCompleted {
            job_name: job.name.clone(),
            stage,
            status,
            exit_code,
            duration,
        });

        StageResult {
            stage,
            status,
            exit_code,
            stdout,
            stderr,
            duration,
            reason,
        }
    }

    async fn run_deploy(
        &self,
        gate: &DeployGate,
        decision: &crate::deploy::DeployDecision,
        job: &JobSpec,
        ctx: &RunContext,
    ) -> Option<StageResult> {
        let start = Instant::now();

        if !decision.fire {
            self.events.send_event(ExecutionEvent::DeploySkipped {
                job_name: job.name.clone(),
                reason: decision.reason.clone(),
            });
            return Some(StageResult::skipped(Stage::Deploy, decision.reason.clone()));
        }

        // The gate only fires with a tag and a target present, so these
        // lookups cannot miss on a firing decision.
        let target = job.target.as_deref().unwrap_or_default();
        let glob = match gate.artifact_glob(&ctx.trigger, target) {
            Ok(glob) => glob,
            Err(e) => return Some(self.deploy_failure(start, e.to_string())),
        };
        let tag = ctx.trigger.tag().unwrap_or_default();

        self.events.send_event(ExecutionEvent::DeployFired {
            job_name: job.name.clone(),
            artifact_glob: glob.clone(),
        });

        let api_key_env = self
            .config
            .deploy
            .as_ref()
            .and_then(|d| d.api_key_env.as_deref())
            .unwrap_or_default();
        let api_key = match std::env::var(api_key_env) {
            Ok(key) => key,
            Err(_) => {
                return Some(
                    self.deploy_failure(start, format!("API key variable '{}' not set", api_key_env)),
                )
            }
        };

        match self.uploader.upload(&api_key, &glob, tag, target).await {
            Ok(()) => Some(StageResult {
                stage: Stage::Deploy,
                status: StageStatus::Succeeded,
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
                duration: start.elapsed(),
                reason: None,
            }),
            Err(e) => Some(self.deploy_failure(start, e.to_string())),
        }
    }

    fn deploy_failure(&self, start: Instant, reason: String) -> StageResult {
        StageResult {
            stage: Stage::Deploy,
            status: StageStatus::Failed,
            exit_code: None,
            stdout: String::new(),
            stderr: reason.clone(),
            duration: start.elapsed(),
            reason: Some(reason),
        }
    }

    fn output_sink(&self, job_name: &str, stage: Stage) -> Option<OutputSink> {
        let tx = self.events.clone()?;
        let job_name = job_name.to_string();
        Some(Box::new(move |line, is_error| {
            tx.send_event(ExecutionEvent::stage_output(&job_name, stage, line, is_error));
        }))
    }
}
