// Runners Module
// Subprocess execution collaborators for stage commands

pub mod shell;

pub use shell::{Shell, ShellOutput, ShellRunner};

use std::collections::HashMap;
use std::path::Path;

/// Callback invoked per output line; the bool flags stderr lines
pub type OutputSink = Box<dyn Fn(&str, bool) + Send + Sync>;

/// Trait for command runners. The stage runner only depends on this seam,
/// so tests can substitute a fake that never spawns a process.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute a single command with the given environment overlay and
    /// working directory, optionally streaming output lines.
    async fn run(
        &self,
        command: &str,
        env: &HashMap<String, String>,
        working_dir: &Path,
        output: Option<OutputSink>,
    ) -> ShellOutput;
}
