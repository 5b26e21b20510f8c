//! TabLifecycleManager - タブの取得と load 完了待ち
//!
//! Builds locate-or-create and a one-shot load completion on top of the raw
//! `TabHost` port.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::domain::{LoadState, TabError, TabHandle, TabPolicy, TabStatusEvent};
use crate::ports::TabHost;

pub struct TabLifecycleManager {
    host: Arc<dyn TabHost>,
    target_url: String,
}

/// A tab obtained for one task, plus its load-completion future.
pub struct AcquiredTab {
    pub handle: TabHandle,
    pub reused: bool,
    pub load: LoadCompletion,
}

/// Resolves once, when the tab's document reaches `Complete`.
pub struct LoadCompletion {
    tab: TabHandle,
    events: broadcast::Receiver<TabStatusEvent>,
}

impl LoadCompletion {
    pub fn tab(&self) -> &TabHandle {
        &self.tab
    }

    /// Wait for the tab to finish loading.
    ///
    /// Resolves immediately for a handle that is already complete. Fails with
    /// `TabError::Closed` if the tab goes away first.
    pub async fn wait(mut self) -> Result<TabHandle, TabError> {
        if self.tab.is_complete() {
            return Ok(self.tab);
        }

        loop {
            match self.events.recv().await {
                Ok(TabStatusEvent::Complete { tab_id }) if tab_id == self.tab.tab_id => {
                    self.tab.load_state = LoadState::Complete;
                    return Ok(self.tab);
                }
                Ok(TabStatusEvent::Removed { tab_id }) if tab_id == self.tab.tab_id => {
                    return Err(TabError::Closed(tab_id));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(tab_id = %self.tab.tab_id, skipped, "tab status stream lagged");
                    continue;
                }
                Err(RecvError::Closed) => return Err(TabError::EventsClosed),
            }
        }
    }
}

impl TabLifecycleManager {
    pub fn new(host: Arc<dyn TabHost>, target_url: impl Into<String>) -> Self {
        Self {
            host,
            target_url: target_url.into(),
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn host(&self) -> &Arc<dyn TabHost> {
        &self.host
    }

    pub async fn find_existing_tab(&self) -> Result<Option<TabHandle>, TabError> {
        self.host.find_by_url(&self.target_url).await
    }

    pub async fn focus(&self, tab: &TabHandle) -> Result<(), TabError> {
        self.host.focus(tab).await
    }

    pub async fn create_tab(&self) -> Result<TabHandle, TabError> {
        self.host.create(&self.target_url).await
    }

    /// Load completion for a tab obtained elsewhere.
    ///
    /// Subscribes at call time; a `Complete` event broadcast before this call
    /// is only covered if `tab` already reports `Complete`.
    pub fn on_load_complete(&self, tab: TabHandle) -> LoadCompletion {
        LoadCompletion {
            tab,
            events: self.host.status_events(),
        }
    }

    /// Locate or create a tab according to `policy`.
    pub async fn acquire(&self, policy: TabPolicy) -> Result<AcquiredTab, TabError> {
        // subscribe first so a fast load cannot slip past
        let events = self.host.status_events();

        if policy == TabPolicy::ReuseExisting
            && let Some(handle) = self.find_existing_tab().await?
        {
            self.focus(&handle).await?;
            info!(tab_id = %handle.tab_id, "reusing existing tab");
            return Ok(AcquiredTab {
                load: LoadCompletion {
                    tab: handle.clone(),
                    events,
                },
                handle,
                reused: true,
            });
        }

        let handle = self.create_tab().await?;
        debug!(tab_id = %handle.tab_id, url = %handle.url, "created tab");
        Ok(AcquiredTab {
            load: LoadCompletion {
                tab: handle.clone(),
                events,
            },
            handle,
            reused: false,
        })
    }
}
