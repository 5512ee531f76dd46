// Shell Runner
// Executes stage commands through the platform shell

use crate::runners::{CommandRunner, OutputSink};

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Shells supported by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    /// Default shell (sh on Unix, cmd on Windows)
    Default,
    /// Bash shell
    Bash,
}

impl Shell {
    fn get_command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Shell::Default => {
                if cfg!(target_os = "windows") {
                    ("cmd", &["/C"])
                } else {
                    ("sh", &["-c"])
                }
            }
            Shell::Bash => ("bash", &["-c"]),
        }
    }
}

/// Output collected from one command invocation
#[derive(Debug, Clone, Default)]
pub struct ShellOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code (None when the process was killed or failed to spawn)
    pub exit_code: Option<i32>,
}

impl ShellOutput {
    /// Whether the command exited zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn spawn_failure(shell_cmd: &str, err: std::io::Error) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("Failed to spawn shell process '{}': {}", shell_cmd, err),
            exit_code: None,
        }
    }
}

/// Shell runner for executing stage commands
pub struct ShellRunner {
    default_shell: Shell,
    timeout: Option<Duration>,
}

impl ShellRunner {
    /// Create a new shell runner with the platform default shell
    pub fn new() -> Self {
        Self {
            default_shell: Shell::Default,
            timeout: None,
        }
    }

    /// Create a shell runner with a specific shell
    pub fn with_shell(shell: Shell) -> Self {
        Self {
            default_shell: shell,
            timeout: None,
        }
    }

    /// Kill commands that run longer than the given duration
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run_with_shell(
        &self,
        shell: Shell,
        command: &str,
        env: &HashMap<String, String>,
        working_dir: &Path,
        on_output: Option<OutputSink>,
    ) -> ShellOutput {
        let (shell_cmd, shell_args) = shell.get_command();

        let mut cmd = Command::new(shell_cmd);
        cmd.args(shell_args);
        cmd.arg(command);
        cmd.current_dir(working_dir);
        cmd.envs(env);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return ShellOutput::spawn_failure(shell_cmd, e),
        };

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let on_output = on_output.map(std::sync::Arc::new);
        let sink_stdout = on_output.clone();
        let sink_stderr = on_output;

        let stdout_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut output = String::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(sink) = &sink_stdout {
                    (**sink)(&line, false);
                }
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&line);
            }
            output
        });

        let stderr_handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut output = String::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(sink) = &sink_stderr {
                    (**sink)(&line, true);
                }
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&line);
            }
            output
        });

        let wait_result = if let Some(timeout) = self.timeout {
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    let _ = child.kill().await;
                    return ShellOutput {
                        stdout: stdout_handle.await.unwrap_or_default(),
                        stderr: format!("Process timed out after {:?}", timeout),
                        exit_code: None,
                    };
                }
            }
        } else {
            child.wait().await
        };

        ShellOutput {
            stdout: stdout_handle.await.unwrap_or_default(),
            stderr: stderr_handle.await.unwrap_or_default(),
            exit_code: wait_result.ok().and_then(|s| s.code()),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        env: &HashMap<String, String>,
        working_dir: &Path,
        output: Option<OutputSink>,
    ) -> ShellOutput {
        self.run_with_shell(self.default_shell, command, env, working_dir, output)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shell_runner_echo() {
        let runner = ShellRunner::new();
        let env = HashMap::new();
        let working_dir = std::env::current_dir().unwrap();

        let output = runner.run("echo hello", &env, &working_dir, None).await;

        assert_eq!(output.exit_code, Some(0));
        assert!(output.success());
        assert!(output.stdout.contains("hello"));
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_shell_runner_with_env() {
        let runner = ShellRunner::new();
        let mut env = HashMap::new();
        env.insert("MY_VAR".to_string(), "test_value".to_string());
        let working_dir = std::env::current_dir().unwrap();

        let script = if cfg!(target_os = "windows") {
            "echo %MY_VAR%"
        } else {
            "echo $MY_VAR"
        };

        let output = runner.run(script, &env, &working_dir, None).await;

        assert_eq!(output.exit_code, Some(0));
        assert!(output.stdout.contains("test_value"));
    }

    #[tokio::test]
    async fn test_shell_runner_exit_code() {
        let runner = ShellRunner::new();
        let env = HashMap::new();
        let working_dir = std::env::current_dir().unwrap();

        let output = runner.run("exit 42", &env, &working_dir, None).await;

        assert_eq!(output.exit_code, Some(42));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_shell_runner_stderr() {
        let runner = ShellRunner::new();
        let env = HashMap::new();
        let working_dir = std::env::current_dir().unwrap();

        let output = runner.run("echo error >&2", &env, &working_dir, None).await;

        assert_eq!(output.exit_code, Some(0));
        assert!(output.stderr.contains("error"));
    }

    #[tokio::test]
    async fn test_shell_runner_streaming() {
        use std::sync::{Arc, Mutex};

        let runner = ShellRunner::new();
        let env = HashMap::new();
        let working_dir = std::env::current_dir().unwrap();

        let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = lines.clone();
        let sink: OutputSink = Box::new(move |line, _is_err| {
            sink_lines.lock().unwrap().push(line.to_string());
        });

        let output = runner
            .run("echo one && echo two", &env, &working_dir, Some(sink))
            .await;

        assert_eq!(output.exit_code, Some(0));
        let lines = lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.contains("one")));
        assert!(lines.iter().any(|l| l.contains("two")));
    }

    #[tokio::test]
    async fn test_shell_runner_timeout_kills() {
        let runner = ShellRunner::new().with_timeout(Duration::from_millis(200));
        let env = HashMap::new();
        let working_dir = std::env::current_dir().unwrap();

        let output = runner.run("sleep 5", &env, &working_dir, None).await;

        assert_eq!(output.exit_code, None);
        assert!(output.stderr.contains("timed out"));
    }
}
