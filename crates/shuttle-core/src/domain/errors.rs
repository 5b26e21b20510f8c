//! Errors - エラー型と分類
//!
//! `FailureKind` is the operational classification used in logs and events;
//! the `thiserror` enums are what functions actually return.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tab::TabId;

/// Operational classification of failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A required element never appeared within the probe deadline.
    /// Recovery: reload and retry.
    ElementTimeout,
    /// A non-essential control was absent. Recovery: skip the step.
    MissingOptionalControl,
    /// Any other fault during configuration or submission.
    /// Recovery: abort the attempt, still signal the Coordinator.
    UnclassifiedRuntimeFault,
    /// A completion signal that never arrived.
    /// Recovery: task-level timeout, if configured.
    LostSignal,
}

/// Failure talking to a live document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("script error: {0}")]
    Script(String),

    #[error("page detached: {0}")]
    Detached(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Failure locating, creating or observing a tab.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TabError {
    #[error("tab {0} was closed")]
    Closed(TabId),

    #[error("tab {0} not found")]
    NotFound(TabId),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("tab status stream ended")]
    EventsClosed,
}

/// Page Probe failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Timeout: Element {selector:?} not found within {timeout:?}")]
    Timeout { selector: String, timeout: Duration },

    #[error(transparent)]
    Page(#[from] PageError),
}

/// Top-level error of the orchestration core.
#[derive(Debug, Error)]
pub enum ShuttleError {
    #[error(transparent)]
    Page(#[from] PageError),

    #[error(transparent)]
    Tab(#[from] TabError),

    #[error("task runner is already executing a sequence")]
    RunnerBusy,

    #[error("coordinator has been shut down")]
    ShutDown,

    #[error("{0}")]
    Other(String),
}
