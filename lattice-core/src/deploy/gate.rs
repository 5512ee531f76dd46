// Deploy Gate
// Decides whether the deploy stage fires for a job and builds the artifact glob

use crate::error::{CoreError, CoreResult};

use std::fmt;

/// What caused this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTrigger {
    /// Ordinary branch commit
    Branch,
    /// Version-tag push carrying the tag name
    Tag(String),
}

impl RunTrigger {
    /// Tag name when this run is tag-triggered
    pub fn tag(&self) -> Option<&str> {
        match self {
            RunTrigger::Branch => None,
            RunTrigger::Tag(tag) => Some(tag),
        }
    }
}

/// Per-job deploy decision, recomputed at deploy time and never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployDecision {
    pub fire: bool,
    pub reason: String,
}

impl DeployDecision {
    fn fire() -> Self {
        Self {
            fire: true,
            reason: "tag-triggered release on matching channel".to_string(),
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self {
            fire: false,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DeployDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fire {
            write!(f, "deploy: {}", self.reason)
        } else {
            write!(f, "skip: {}", self.reason)
        }
    }
}

/// Gate deciding whether a job's deploy stage fires.
#[derive(Debug, Clone)]
pub struct DeployGate {
    project: String,
    required_channel: String,
}

impl DeployGate {
    pub fn new(project: impl Into<String>, required_channel: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            required_channel: required_channel.into(),
        }
    }

    /// Decide whether the deploy stage fires for a job.
    ///
    /// Fires only when the run is tag-triggered, the job's channel matches
    /// the required release channel, and the job has a target triple.
    pub fn evaluate(
        &self,
        trigger: &RunTrigger,
        channel: &str,
        target: Option<&str>,
    ) -> DeployDecision {
        if trigger.tag().is_none() {
            return DeployDecision::skip("not a tag-triggered run");
        }
        if channel != self.required_channel {
            return DeployDecision::skip(format!(
                "channel '{}' does not match release channel '{}'",
                channel, self.required_channel
            ));
        }
        match target {
            Some(t) if !t.is_empty() => DeployDecision::fire(),
            _ => DeployDecision::skip("job has no target triple"),
        }
    }

    /// Build the artifact glob `{project}-{tag}-{target}.*` for a firing job.
    ///
    /// Rejects calls outside a tag-triggered run; the executor only reaches
    /// this path after a positive gate decision, so a missing tag here is a
    /// caller bug, not a runtime condition.
    pub fn artifact_glob(&self, trigger: &RunTrigger, target: &str) -> CoreResult<String> {
        let tag = trigger.tag().ok_or(CoreError::MissingTagContext)?;
        Ok(format!("{}-{}-{}.*", self.project, tag, target))
    }
}
