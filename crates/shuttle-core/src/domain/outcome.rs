//! Outcome model: what one sequence run produced, and how a task ended.
//!
//! `SequenceOutcome` is produced by the Sequence Executor and consumed by the
//! Task Runner. `TaskResolution` is what the Coordinator records once a task
//! leaves the in-flight slot.

use serde::{Deserialize, Serialize};

/// Terminal result of one Sequence Executor run.
///
/// Serialized as SCREAMING_SNAKE_CASE under `kind`, e.g.
/// `{"kind":"TIMEOUT_FAILURE","selector":"textarea"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SequenceOutcome {
    Success,

    /// A required element did not appear before the probe deadline.
    TimeoutFailure { selector: String },

    /// Anything else that stopped the attempt.
    OtherFailure { message: String },
}

impl SequenceOutcome {
    pub fn timeout(selector: impl Into<String>) -> Self {
        Self::TimeoutFailure {
            selector: selector.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::OtherFailure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SequenceOutcome::Success)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SequenceOutcome::TimeoutFailure { .. })
    }
}

/// How a task left the in-flight slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resolution", rename_all = "snake_case")]
pub enum TaskResolution {
    /// `sequenceComplete` arrived from the task's tab.
    Completed,

    /// `sequenceFailed` arrived from the task's tab.
    Failed { reason: String },

    /// The task-level deadline expired before a signal arrived.
    TimedOut,

    /// The tab could not be obtained, never finished loading, or went away.
    TabLost { reason: String },
}

impl TaskResolution {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskResolution::Completed)
    }
}
