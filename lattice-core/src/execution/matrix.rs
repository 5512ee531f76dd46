// Matrix Expansion
// Turns declared matrix entries into concrete job specifications

use crate::config::models::{MatrixConfig, MatrixEntry, Step};
use crate::deploy::RunTrigger;
use crate::error::{CoreError, CoreResult};

use std::collections::HashMap;

/// One concrete job, produced from exactly one matrix entry.
/// Immutable after expansion; the index preserves declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    /// Position of the source entry in the matrix (declaration order)
    pub index: usize,
    /// Human-readable name: "os/channel[/target]"
    pub name: String,
    /// Operating system name
    pub os: String,
    /// Toolchain channel
    pub channel: String,
    /// Target triple, when declared
    pub target: Option<String>,
    /// Assembled per-job environment (global defaults + axis variables)
    pub env: HashMap<String, String>,
    /// Install stage override
    pub install: Option<Vec<Step>>,
    /// Script stage override
    pub script: Option<Vec<Step>>,
}

/// Expands a matrix description into an ordered job sequence.
///
/// Pure transform: the same description and trigger always produce the same
/// sequence, and each declared entry maps to exactly one job (explicit
/// enumeration, not cartesian-product expansion).
pub struct MatrixExpander;

impl MatrixExpander {
    /// Expand all entries, in declaration order.
    pub fn expand(config: &MatrixConfig, trigger: &RunTrigger) -> CoreResult<Vec<JobSpec>> {
        // TARGET is always entry-level; a global TARGET is conflicting intent.
        if config.env.contains_key("TARGET") {
            return Err(CoreError::DuplicateEnvKey {
                key: "TARGET".to_string(),
            });
        }

        config
            .matrix
            .iter()
            .enumerate()
            .map(|(index, entry)| Self::expand_entry(config, trigger, index, entry))
            .collect()
    }

    fn expand_entry(
        config: &MatrixConfig,
        trigger: &RunTrigger,
        index: usize,
        entry: &MatrixEntry,
    ) -> CoreResult<JobSpec> {
        if entry.os.trim().is_empty() {
            return Err(CoreError::MalformedMatrixEntry { index, field: "os" });
        }
        if entry.channel.trim().is_empty() {
            return Err(CoreError::MalformedMatrixEntry {
                index,
                field: "channel",
            });
        }

        for key in entry.env.keys() {
            // The target field owns TARGET; global keys stay global.
            if key == "TARGET" || config.env.contains_key(key) {
                return Err(CoreError::DuplicateEnvKey { key: key.clone() });
            }
        }

        let mut env = config.env.clone();
        env.extend(entry.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env.insert("CI_OS_NAME".to_string(), entry.os.clone());
        env.insert("CI_RUST_VERSION".to_string(), entry.channel.clone());
        if let Some(target) = &entry.target {
            env.insert("TARGET".to_string(), target.clone());
        }
        if let Some(tag) = trigger.tag() {
            env.insert("CI_TAG".to_string(), tag.to_string());
        }

        let name = match &entry.target {
            Some(target) => format!("{}/{}/{}", entry.os, entry.channel, target),
            None => format!("{}/{}", entry.os, entry.channel),
        };

        Ok(JobSpec {
            index,
            name,
            os: entry.os.clone(),
            channel: entry.channel.clone(),
            target: entry.target.clone(),
            env,
            install: entry.install.clone(),
            script: entry.script.clone(),
        })
    }
}

impl JobSpec {
    /// Override steps for the install stage, ignoring empty override lists
    pub fn install_override(&self) -> Option<&[Step]> {
        self.install.as_deref().filter(|s| !s.is_empty())
    }

    /// Override steps for the script stage, ignoring empty override lists
    pub fn script_override(&self) -> Option<&[Step]> {
        self.script.as_deref().filter(|s| !s.is_empty())
    }
}
