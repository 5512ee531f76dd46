// Execution Module
// Matrix expansion, staged job execution, events, and run orchestration

pub mod events;
pub mod executor;
pub mod job;
pub mod matrix;

pub use events::{progress_channel, EventSender, ExecutionEvent, ProgressReceiver, ProgressSender};
pub use executor::{RunContext, RunExecutor, RunResult};
pub use job::{JobResult, JobStatus, StageResult, StageRunner};
pub use matrix::{JobSpec, MatrixExpander};
