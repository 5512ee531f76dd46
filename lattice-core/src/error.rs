// Core Error Types
// Shared error taxonomy for configuration, expansion, and execution

use crate::config::Stage;

use std::io;
use thiserror::Error;

/// Errors produced by the lattice core
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("matrix entry {index} is missing required field '{field}'")]
    MalformedMatrixEntry { index: usize, field: &'static str },

    #[error("environment key '{key}' is declared at both the global and entry level")]
    DuplicateEnvKey { key: String },

    #[error("stage '{stage}' failed with exit code {exit_code}")]
    StageFailed { stage: Stage, exit_code: i32 },

    #[error("unbound variable '{name}' in condition")]
    UnboundVariable { name: String },

    #[error("deploy gate consulted outside a tag-triggered run")]
    MissingTagContext,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("upload failed: {0}")]
    Upload(String),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
