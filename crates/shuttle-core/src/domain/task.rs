use serde::{Deserialize, Serialize};

use super::ids::{BatchId, TaskId};
use super::tab::TabPolicy;

/// One prompt's worth of work, immutable once enqueued.
///
/// Fields are private so nothing downstream of the Coordinator can rewrite a
/// queued prompt; read them through the accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTask {
    task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    batch_id: Option<BatchId>,
    prompt_text: String,
    ordinal: u32,
    tab_policy: TabPolicy,
}

impl PromptTask {
    pub fn new(
        task_id: TaskId,
        prompt_text: impl Into<String>,
        ordinal: u32,
        tab_policy: TabPolicy,
    ) -> Self {
        Self {
            task_id,
            batch_id: None,
            prompt_text: prompt_text.into(),
            ordinal,
            tab_policy,
        }
    }

    pub fn in_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn batch_id(&self) -> Option<BatchId> {
        self.batch_id
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    /// Position in submission order (1-based, never reused).
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn tab_policy(&self) -> TabPolicy {
        self.tab_policy
    }
}
