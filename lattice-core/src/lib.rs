// Lattice Core Library
// Build-matrix expansion, condition evaluation, and staged job execution

pub mod config;
pub mod deploy;
pub mod error;
pub mod execution;
pub mod expression;
pub mod runners;

// Re-export commonly used types
pub use error::{CoreError, CoreResult};

// Re-export configuration types
pub use config::{ConfigParser, DeployConfig, MatrixConfig, MatrixEntry, Stage, StageStatus, Step};

// Re-export expression types
pub use expression::{evaluate, EvalError, Evaluator, Expr, ExprParser};

// Re-export execution types
pub use execution::{
    progress_channel, EventSender, ExecutionEvent, JobResult, JobSpec, JobStatus, MatrixExpander,
    ProgressReceiver, ProgressSender, RunContext, RunExecutor, RunResult, StageResult, StageRunner,
};

// Re-export deploy types
pub use deploy::{
    DeployDecision, DeployGate, DryRunUploader, GithubUploader, ReleaseUploader, RunTrigger,
    UploadError,
};

// Re-export runner types
pub use runners::{CommandRunner, OutputSink, Shell, ShellOutput, ShellRunner};
