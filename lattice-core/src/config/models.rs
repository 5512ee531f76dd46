// Matrix Description Models
// Types representing the declarative build-matrix YAML schema

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Root matrix description.
///
/// One entry per declared axis combination, plus global defaults for the
/// per-stage command lists and the shared environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MatrixConfig {
    /// Project name, substituted into the artifact glob on deploy
    pub project: String,

    /// Global environment defaults (e.g. HOST), shared by every job
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Explicitly enumerated matrix entries, one job per entry
    #[serde(default)]
    pub matrix: Vec<MatrixEntry>,

    /// Default before_install steps
    #[serde(default)]
    pub before_install: Vec<Step>,

    /// Default install steps (entries may override)
    #[serde(default)]
    pub install: Vec<Step>,

    /// Default script steps (entries may override)
    #[serde(default)]
    pub script: Vec<Step>,

    /// Default before_deploy steps, run only when the deploy gate fires
    #[serde(default)]
    pub before_deploy: Vec<Step>,

    /// Deploy configuration; absent means the deploy stage never runs
    pub deploy: Option<DeployConfig>,
}

impl MatrixConfig {
    /// Global default steps for a stage. Install/script overrides are
    /// resolved per job by the stage runner, not here.
    pub fn default_steps(&self, stage: Stage) -> &[Step] {
        match stage {
            Stage::BeforeInstall => &self.before_install,
            Stage::Install => &self.install,
            Stage::Script => &self.script,
            Stage::BeforeDeploy => &self.before_deploy,
            Stage::Deploy => &[],
        }
    }
}

/// One declared combination of build axis values.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MatrixEntry {
    /// Operating system name (e.g. "linux", "osx")
    #[serde(default)]
    pub os: String,

    /// Toolchain channel (e.g. "stable", "nightly")
    #[serde(default)]
    pub channel: String,

    /// Target triple for cross builds and artifact selection
    #[serde(default)]
    pub target: Option<String>,

    /// Entry-level environment additions. Keys owned by the global map
    /// (HOST included) are rejected at expansion time.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Override for the install stage; empty or absent falls back to the
    /// global install steps
    #[serde(default)]
    pub install: Option<Vec<Step>>,

    /// Override for the script stage
    #[serde(default)]
    pub script: Option<Vec<Step>>,
}

/// A single command within a stage: either a plain command string or a
/// command with a gating condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Step {
    Run(String),
    Conditional {
        run: String,
        #[serde(default)]
        when: Option<String>,
    },
}

impl Step {
    /// The command string to execute
    pub fn run(&self) -> &str {
        match self {
            Step::Run(cmd) => cmd,
            Step::Conditional { run, .. } => run,
        }
    }

    /// The gating condition, if any
    pub fn when(&self) -> Option<&str> {
        match self {
            Step::Run(_) => None,
            Step::Conditional { when, .. } => when.as_deref(),
        }
    }
}

impl From<&str> for Step {
    fn from(cmd: &str) -> Self {
        Step::Run(cmd.to_string())
    }
}

/// Deploy stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Release provider (only "github" is recognized)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Name of the environment variable holding the release API key
    pub api_key_env: Option<String>,

    /// Gating conditions for the deploy stage
    #[serde(default, rename = "on")]
    pub on: DeployOn,
}

/// Conditions under which the deploy stage fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployOn {
    /// Required toolchain channel
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Whether deploys are restricted to tag-triggered runs
    #[serde(default = "default_true")]
    pub tags: bool,
}

impl Default for DeployOn {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            tags: true,
        }
    }
}

fn default_provider() -> String {
    "github".to_string()
}

fn default_channel() -> String {
    "stable".to_string()
}

fn default_true() -> bool {
    true
}

/// Lifecycle stages of a job, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    BeforeInstall,
    Install,
    Script,
    BeforeDeploy,
    Deploy,
}

impl Stage {
    /// Fixed execution order for every job
    pub const ORDER: [Stage; 5] = [
        Stage::BeforeInstall,
        Stage::Install,
        Stage::Script,
        Stage::BeforeDeploy,
        Stage::Deploy,
    ];

    /// Mandatory stages abort the job on failure; before_deploy and deploy
    /// failures are reported only.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Stage::BeforeInstall | Stage::Install | Stage::Script)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::BeforeInstall => "before_install",
            Stage::Install => "install",
            Stage::Script => "script",
            Stage::BeforeDeploy => "before_deploy",
            Stage::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one executed (or skipped) stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Succeeded => write!(f, "succeeded"),
            StageStatus::Failed => write!(f, "failed"),
            StageStatus::Skipped => write!(f, "skipped"),
        }
    }
}
