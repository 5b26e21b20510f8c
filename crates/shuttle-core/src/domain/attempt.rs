//! Attempt and Decision records for execution history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AttemptId, TaskId};
use super::outcome::SequenceOutcome;

/// A single Task Runner pass over the page.
///
/// Records which attempt it was and what the sequence produced. Together with
/// `DecisionRecord` this explains why a task was reloaded N times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: AttemptId,
    pub task_id: TaskId,

    /// 1-indexed attempt number within the task.
    pub attempt: u32,

    pub outcome: SequenceOutcome,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(
        attempt_id: AttemptId,
        task_id: TaskId,
        attempt: u32,
        outcome: SequenceOutcome,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            attempt_id,
            task_id,
            attempt,
            outcome,
            started_at,
            completed_at,
        }
    }
}

/// A decision made after an attempt.
///
/// Records:
/// - What observation led to this decision (trigger)
/// - What policy was applied
/// - What was decided ("complete", "reload_and_retry", "fail")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub task_id: TaskId,

    pub trigger: serde_json::Value,

    pub policy: String,

    pub decision: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,

    pub decided_at: DateTime<Utc>,
}

impl DecisionRecord {
    pub fn new(
        task_id: TaskId,
        trigger: serde_json::Value,
        policy: impl Into<String>,
        decision: impl Into<String>,
        context: Option<serde_json::Value>,
        decided_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            trigger,
            policy: policy.into(),
            decision: decision.into(),
            context,
            decided_at,
        }
    }
}
