//! Messages crossing the context boundaries.
//!
//! | Message | Direction |
//! |---|---|
//! | `startAutomation` / `startBatchAutomation` | UI → Coordinator |
//! | `sequenceComplete` / `sequenceFailed` | Task Runner → Coordinator |
//!
//! Both enums are tagged by `action` with camelCase names so a browser-side
//! front end can send the same JSON it always did.

use serde::{Deserialize, Serialize};

use super::tab::TabId;

/// A request handed to the Coordinator by an operator surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    StartAutomation { prompt: String },
    StartBatchAutomation { prompts: Vec<String> },
}

/// Terminal signal emitted by a Task Runner, exactly one per dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RunnerSignal {
    SequenceComplete,
    SequenceFailed { reason: String },
}

/// A runner signal scoped by the tab it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub origin: TabId,
    pub signal: RunnerSignal,
}

impl SignalEnvelope {
    pub fn new(origin: TabId, signal: RunnerSignal) -> Self {
        Self { origin, signal }
    }
}
