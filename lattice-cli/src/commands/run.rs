use crate::output;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::Result;

use lattice_core::{
    progress_channel, ConfigParser, ExecutionEvent, GithubUploader, JobStatus, RunContext,
    RunExecutor, RunTrigger, StageStatus,
};

/// Run every job in the build matrix
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the matrix description YAML file
    #[arg(default_value = "lattice.yaml")]
    pub config: PathBuf,

    /// Tag name for a tag-triggered (release) run
    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Set a variable in every job's environment (format: name=value)
    #[arg(long = "var", short = 'v', value_name = "NAME=VALUE")]
    pub variables: Vec<String>,

    /// Maximum number of jobs running at once
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Working directory for stage commands
    #[arg(long, short = 'w', value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Upload release artifacts to this GitHub repository (owner/repo);
    /// without it, deploys are dry-run
    #[arg(long, value_name = "OWNER/REPO")]
    pub upload_repo: Option<String>,

    /// Directory searched for release artifacts
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub artifacts_dir: PathBuf,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    if !args.config.exists() {
        color_eyre::eyre::bail!("Matrix description not found: {}", args.config.display());
    }

    // Parse variables from --var flags
    let mut variables = HashMap::new();
    for var_str in &args.variables {
        if let Some((name, value)) = var_str.split_once('=') {
            variables.insert(name.to_string(), value.to_string());
        } else {
            color_eyre::eyre::bail!("Invalid variable format '{}'. Expected name=value", var_str);
        }
    }

    let working_dir = match &args.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    output::status("Parsing", &format!("{}", args.config.display()));
    let config = ConfigParser::from_file(&args.config)
        .and_then(|c| {
            ConfigParser::validate(&c)?;
            Ok(c)
        })
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    output::info(&format!(
        "Matrix '{}': {} entries",
        config.project,
        config.matrix.len()
    ));

    let trigger = match &args.tag {
        Some(tag) => RunTrigger::Tag(tag.clone()),
        None => RunTrigger::Branch,
    };

    let (tx, mut rx) = progress_channel();

    let mut executor = RunExecutor::new(config)
        .with_progress(tx)
        .with_extra_env(variables);
    if let Some(max_parallel) = args.max_parallel {
        executor = executor.with_max_parallel(max_parallel);
    }
    if let Some(repo) = &args.upload_repo {
        executor = executor.with_uploader(Arc::new(GithubUploader::new(
            repo.clone(),
            args.artifacts_dir.clone(),
        )));
    }

    let ctx = RunContext::new(trigger, working_dir);
    let exec_handle = tokio::spawn(async move { executor.execute(ctx).await });

    // Render events in the foreground while jobs run
    while let Some(event) = rx.recv().await {
        match &event {
            ExecutionEvent::RunStarted {
                project,
                total_jobs,
                tag,
            } => {
                println!();
                match tag {
                    Some(tag) => {
                        output::header(&format!("{} ({} jobs, tag {})", project, total_jobs, tag))
                    }
                    None => output::header(&format!("{} ({} jobs)", project, total_jobs)),
                }
            }

            ExecutionEvent::RunCompleted {
                success, duration, ..
            } => {
                println!();
                if *success {
                    output::success(&format!(
                        "Matrix completed successfully in {:.2}s",
                        duration.as_secs_f64()
                    ));
                } else {
                    output::failure(&format!(
                        "Matrix failed after {:.2}s",
                        duration.as_secs_f64()
                    ));
                }
            }

            ExecutionEvent::JobStarted { job_name, .. } => {
                println!("  Job '{}'", job_name);
            }

            ExecutionEvent::JobCompleted {
                job_name,
                status,
                duration,
                ..
            } => {
                let line = format!(
                    "  Job '{}' {} ({:.2}s)",
                    job_name,
                    if *status == JobStatus::Succeeded {
                        "OK"
                    } else {
                        "FAIL"
                    },
                    duration.as_secs_f64()
                );
                if *status == JobStatus::Succeeded {
                    output::dim_success(&line);
                } else {
                    output::dim_failure(&line);
                }
            }

            ExecutionEvent::StageStarted { job_name, stage } => {
                output::status("Running", &format!("{} [{}]", stage, job_name));
            }

            ExecutionEvent::StageOutput { line, .. } => {
                output::step_output(line);
            }

            ExecutionEvent::StageCompleted {
                job_name,
                stage,
                status,
                exit_code,
                duration,
            } => {
                let line = format!(
                    "    {} [{}] {} ({:.2}s, exit code: {:?})",
                    stage,
                    job_name,
                    status,
                    duration.as_secs_f64(),
                    exit_code
                );
                if *status == StageStatus::Failed {
                    output::dim_failure(&line);
                } else {
                    output::dim_success(&line);
                }
            }

            ExecutionEvent::StageSkipped {
                job_name,
                stage,
                reason,
            } => {
                output::warning(&format!("  {} [{}] skipped: {}", stage, job_name, reason));
            }

            ExecutionEvent::DeployFired {
                job_name,
                artifact_glob,
            } => {
                output::info(&format!(
                    "  deploy [{}] uploading artifacts matching '{}'",
                    job_name, artifact_glob
                ));
            }

            ExecutionEvent::DeploySkipped { job_name, reason } => {
                output::warning(&format!("  deploy [{}] skipped: {}", job_name, reason));
            }
        }
    }

    let result = exec_handle
        .await?
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    // Summary: one line per job, declaration order
    println!();
    output::header("Summary");
    for job in &result.jobs {
        match job.failure() {
            None => output::check(&format!("{}", job.job_name)),
            Some(failure) => output::failure(&format!("{}: {}", job.job_name, failure)),
        }
        for stage in &job.stages {
            if stage.stage == lattice_core::Stage::Deploy && stage.status == StageStatus::Failed {
                output::warning(&format!(
                    "{}: deploy failed: {}",
                    job.job_name,
                    stage.reason.as_deref().unwrap_or("unknown")
                ));
            }
        }
    }

    std::process::exit(result.exit_code());
}
