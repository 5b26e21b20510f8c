//! State tokens for the Task Runner and the Coordinator.

use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Task Runner state (one instance per runner).
///
/// State transitions:
/// - Idle -> Probing -> Configuring -> Submitting -> Done
/// - Probing -> Probing (reload and retry after a probe timeout)
/// - any active state -> Done (failure absorbed by the runner)
/// - Done -> Probing (next task)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Idle,
    Probing,
    Configuring,
    Submitting,
    Done,
}

impl RunnerState {
    /// Is a sequence currently executing against the page?
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunnerState::Probing | RunnerState::Configuring | RunnerState::Submitting
        )
    }
}

/// Coordinator state: at most one task in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Busy { in_flight: TaskId },
}

/// Snapshot published by the Coordinator after every queue change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub queued: usize,
    pub completed: usize,
}

impl CoordinatorStatus {
    pub fn idle() -> Self {
        Self {
            state: CoordinatorState::Idle,
            queued: 0,
            completed: 0,
        }
    }

    /// Nothing in flight and nothing waiting.
    pub fn is_idle(&self) -> bool {
        self.state == CoordinatorState::Idle && self.queued == 0
    }

    pub fn in_flight(&self) -> Option<TaskId> {
        match self.state {
            CoordinatorState::Busy { in_flight } => Some(in_flight),
            CoordinatorState::Idle => None,
        }
    }
}

impl Default for CoordinatorStatus {
    fn default() -> Self {
        Self::idle()
    }
}
