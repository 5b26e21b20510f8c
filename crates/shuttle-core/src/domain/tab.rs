//! Browser tab identity and load state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Browser-provided tab identity (Chrome tab id, CDP target id, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of the window hosting a tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(String);

impl WindowId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Loading,
    Complete,
}

/// A tab hosting the target page.
///
/// Owned by the Tab Lifecycle Manager; the Coordinator only borrows it for the
/// duration of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabHandle {
    pub tab_id: TabId,
    pub window_id: WindowId,
    pub url: String,
    pub load_state: LoadState,
}

impl TabHandle {
    pub fn new(
        tab_id: TabId,
        window_id: WindowId,
        url: impl Into<String>,
        load_state: LoadState,
    ) -> Self {
        Self {
            tab_id,
            window_id,
            url: url.into(),
            load_state,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.load_state == LoadState::Complete
    }
}

/// How the Coordinator obtains a tab for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabPolicy {
    /// Focus a tab already showing the target page; open one only if none exists.
    ReuseExisting,
    /// Always open a fresh tab.
    AlwaysNew,
}

/// "Navigation status changed" notification, keyed by tab identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TabStatusEvent {
    Loading { tab_id: TabId },
    Complete { tab_id: TabId },
    Removed { tab_id: TabId },
}

impl TabStatusEvent {
    pub fn tab_id(&self) -> &TabId {
        match self {
            TabStatusEvent::Loading { tab_id }
            | TabStatusEvent::Complete { tab_id }
            | TabStatusEvent::Removed { tab_id } => tab_id,
        }
    }
}
