// Execution Events
// Progress reporting for matrix runs

use crate::config::models::{Stage, StageStatus};
use crate::execution::job::JobStatus;

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted during a matrix run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Run started, after successful expansion
    RunStarted {
        project: String,
        total_jobs: usize,
        tag: Option<String>,
    },

    /// Run finished; success covers mandatory stages only
    RunCompleted {
        success: bool,
        failed_jobs: usize,
        duration: Duration,
    },

    /// Job started
    JobStarted { job_name: String, index: usize },

    /// Job finished
    JobCompleted {
        job_name: String,
        index: usize,
        status: JobStatus,
        duration: Duration,
    },

    /// Stage started
    StageStarted { job_name: String, stage: Stage },

    /// One output line from a stage command
    StageOutput {
        job_name: String,
        stage: Stage,
        line: String,
        is_error: bool,
    },

    /// Stage finished
    StageCompleted {
        job_name: String,
        stage: Stage,
        status: StageStatus,
        exit_code: Option<i32>,
        duration: Duration,
    },

    /// Stage (or a step within it) was skipped
    StageSkipped {
        job_name: String,
        stage: Stage,
        reason: String,
    },

    /// Deploy gate fired; artifacts matching the glob will be uploaded
    DeployFired {
        job_name: String,
        artifact_glob: String,
    },

    /// Deploy gate declined
    DeploySkipped { job_name: String, reason: String },
}

impl ExecutionEvent {
    pub fn run_started(project: impl Into<String>, total_jobs: usize, tag: Option<String>) -> Self {
        Self::RunStarted {
            project: project.into(),
            total_jobs,
            tag,
        }
    }

    pub fn stage_output(
        job_name: impl Into<String>,
        stage: Stage,
        line: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::StageOutput {
            job_name: job_name.into(),
            stage,
            line: line.into(),
            is_error,
        }
    }

    pub fn stage_skipped(job_name: impl Into<String>, stage: Stage, reason: impl Into<String>) -> Self {
        Self::StageSkipped {
            job_name: job_name.into(),
            stage,
            reason: reason.into(),
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_channel() {
        let (tx, mut rx) = progress_channel();

        tx.send_event(ExecutionEvent::run_started("myproj", 2, None));
        tx.send_event(ExecutionEvent::StageStarted {
            job_name: "linux/stable".to_string(),
            stage: Stage::Script,
        });

        assert!(matches!(
            rx.recv().await.unwrap(),
            ExecutionEvent::RunStarted { total_jobs: 2, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ExecutionEvent::StageStarted {
                stage: Stage::Script,
                ..
            }
        ));
    }

    #[test]
    fn test_optional_sender_does_not_panic() {
        let sender: Option<ProgressSender> = None;
        sender.send_event(ExecutionEvent::DeploySkipped {
            job_name: "j".to_string(),
            reason: "not a tag-triggered run".to_string(),
        });
    }
}
