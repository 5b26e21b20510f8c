//! Events - ドメインイベント
//!
//! Emitted to an `EventSink` at every lifecycle step. For one task the order is
//! always `TabLoaded` → `SequenceDispatched` → (attempts, reloads) → exactly
//! one `SignalReceived` → `TaskResolved`.

use serde::Serialize;

use super::attempt::{AttemptRecord, DecisionRecord};
use super::errors::FailureKind;
use super::ids::TaskId;
use super::message::RunnerSignal;
use super::outcome::TaskResolution;
use super::tab::TabId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    TaskEnqueued {
        task_id: TaskId,
        ordinal: u32,
    },
    TabAcquired {
        task_id: TaskId,
        tab_id: TabId,
        reused: bool,
    },
    TabLoaded {
        task_id: TaskId,
        tab_id: TabId,
    },
    SequenceDispatched {
        task_id: TaskId,
        tab_id: TabId,
    },
    StepSkipped {
        task_id: TaskId,
        step: String,
        kind: FailureKind,
    },
    AttemptFinished(AttemptRecord),
    DecisionMade(DecisionRecord),
    ReloadTriggered {
        task_id: TaskId,
        attempt: u32,
    },
    SignalReceived {
        task_id: TaskId,
        tab_id: TabId,
        signal: RunnerSignal,
    },
    StraySignalIgnored {
        origin: TabId,
    },
    TaskResolved {
        task_id: TaskId,
        resolution: TaskResolution,
    },
    QueueDrained,
}

impl DomainEvent {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            DomainEvent::TaskEnqueued { task_id, .. }
            | DomainEvent::TabAcquired { task_id, .. }
            | DomainEvent::TabLoaded { task_id, .. }
            | DomainEvent::SequenceDispatched { task_id, .. }
            | DomainEvent::StepSkipped { task_id, .. }
            | DomainEvent::ReloadTriggered { task_id, .. }
            | DomainEvent::SignalReceived { task_id, .. }
            | DomainEvent::TaskResolved { task_id, .. } => Some(*task_id),
            DomainEvent::AttemptFinished(record) => Some(record.task_id),
            DomainEvent::DecisionMade(record) => Some(record.task_id),
            DomainEvent::StraySignalIgnored { .. } | DomainEvent::QueueDrained => None,
        }
    }

    /// Stable snake_case name, matching the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::TaskEnqueued { .. } => "task_enqueued",
            DomainEvent::TabAcquired { .. } => "tab_acquired",
            DomainEvent::TabLoaded { .. } => "tab_loaded",
            DomainEvent::SequenceDispatched { .. } => "sequence_dispatched",
            DomainEvent::StepSkipped { .. } => "step_skipped",
            DomainEvent::AttemptFinished(_) => "attempt_finished",
            DomainEvent::DecisionMade(_) => "decision_made",
            DomainEvent::ReloadTriggered { .. } => "reload_triggered",
            DomainEvent::SignalReceived { .. } => "signal_received",
            DomainEvent::StraySignalIgnored { .. } => "stray_signal_ignored",
            DomainEvent::TaskResolved { .. } => "task_resolved",
            DomainEvent::QueueDrained => "queue_drained",
        }
    }
}
