//! EventSink 実装
//!
//! - **TracingEventSink**: 各 DomainEvent を tracing の構造化イベントとして出力
//! - **RecordingEventSink**: メモリに記録（テストで順序を検証する用）

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{DomainEvent, TaskId};
use crate::ports::EventSink;

/// Renders domain events through `tracing` under the `shuttle::events` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: DomainEvent) {
        let name = event.name();
        let task_id = event.task_id().map(|id| id.to_string());
        let payload = serde_json::to_string(&event).unwrap_or_default();

        match &event {
            DomainEvent::StepSkipped { .. }
            | DomainEvent::ReloadTriggered { .. }
            | DomainEvent::StraySignalIgnored { .. } => {
                warn!(
                    target: "shuttle::events",
                    event = name,
                    task_id = task_id.as_deref(),
                    %payload
                );
            }
            DomainEvent::AttemptFinished(_) | DomainEvent::DecisionMade(_) => {
                debug!(
                    target: "shuttle::events",
                    event = name,
                    task_id = task_id.as_deref(),
                    %payload
                );
            }
            _ => {
                info!(
                    target: "shuttle::events",
                    event = name,
                    task_id = task_id.as_deref(),
                    %payload
                );
            }
        }
    }
}

/// Keeps every event in emission order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    /// Events belonging to one task.
    pub fn for_task(&self, task_id: TaskId) -> Vec<DomainEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.task_id() == Some(task_id))
            .cloned()
            .collect()
    }

    /// Event names in emission order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(DomainEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: DomainEvent) {
        self.events.lock().push(event);
    }
}
