//! Per-task report kept in the Coordinator's history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::outcome::TaskResolution;
use super::tab::TabId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub ordinal: u32,

    /// `None` when no tab could be obtained.
    pub tab_id: Option<TabId>,

    #[serde(flatten)]
    pub resolution: TaskResolution,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
