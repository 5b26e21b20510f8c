//! CdpTabHost - TabHost over the DevTools HTTP endpoints and one browser
//! WebSocket.
//!
//! CDP has no push notification for "tab finished loading" on targets we
//! are not already attached to, so `create` spawns a small watcher that
//! polls `document.readyState` and publishes `TabStatusEvent`s. A new target
//! starts on a complete `about:blank`; that does not count as loaded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shuttle_core::domain::{LoadState, TabError, TabHandle, TabId, TabStatusEvent, WindowId};
use shuttle_core::ports::{PageContext, TabHost};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::client::CdpClient;
use crate::error::CdpError;
use crate::page::CdpPage;
use crate::page::script;
use crate::protocol::PageInfo;

const STATUS_CAPACITY: usize = 64;
const WATCH_INTERVAL: Duration = Duration::from_millis(250);

struct Inner {
    client: Arc<CdpClient>,
    /// target id -> flat session id
    sessions: Mutex<HashMap<TabId, String>>,
}

impl Inner {
    async fn session_for(&self, tab_id: &TabId) -> Result<String, CdpError> {
        let cached = self.sessions.lock().get(tab_id).cloned();
        if let Some(session) = cached {
            return Ok(session);
        }
        let session = self.client.attach(tab_id.as_str()).await?;
        debug!(tab_id = %tab_id, session_id = %session, "attached to target");
        // a concurrent attach may have won; either session works
        self.sessions
            .lock()
            .entry(tab_id.clone())
            .or_insert_with(|| session.clone());
        Ok(session)
    }

    async fn load_state(&self, tab_id: &TabId) -> Result<LoadState, CdpError> {
        let session = self.session_for(tab_id).await?;
        let value = self
            .client
            .evaluate(&session, script::navigated_and_loaded())
            .await?;
        Ok(load_state_of(&value))
    }

    async fn is_open(&self, tab_id: &TabId) -> Result<bool, CdpError> {
        let pages = self.client.list_pages().await?;
        Ok(pages.iter().any(|p| p.id == tab_id.as_str()))
    }

    fn forget(&self, tab_id: &TabId) {
        self.sessions.lock().remove(tab_id);
    }
}

pub struct CdpTabHost {
    inner: Arc<Inner>,
    status_tx: broadcast::Sender<TabStatusEvent>,
}

impl CdpTabHost {
    /// Connect to Chrome's remote debugging endpoint, e.g. `http://localhost:9222`.
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let client = CdpClient::connect(endpoint).await?;
        info!(endpoint, "connected to browser");
        Ok(Self::with_client(Arc::new(client)))
    }

    pub fn with_client(client: Arc<CdpClient>) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                client,
                sessions: Mutex::new(HashMap::new()),
            }),
            status_tx,
        }
    }

    async fn window_of(&self, target_id: &str) -> Result<WindowId, CdpError> {
        let window = self.inner.client.window_for(target_id).await?;
        Ok(WindowId::new(window.to_string()))
    }

    /// Poll the target until its document is complete or it disappears.
    fn spawn_load_watcher(&self, tab_id: TabId) {
        let inner = Arc::clone(&self.inner);
        let status_tx = self.status_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(WATCH_INTERVAL).await;
                if status_tx.receiver_count() == 0 {
                    trace!(tab_id = %tab_id, "nobody is waiting on this tab; watcher stopped");
                    return;
                }
                match inner.is_open(&tab_id).await {
                    Ok(false) => {
                        inner.forget(&tab_id);
                        let _ = status_tx.send(TabStatusEvent::Removed { tab_id });
                        return;
                    }
                    Ok(true) => {}
                    Err(e) => {
                        warn!(tab_id = %tab_id, error = %e, "failed to list targets");
                        continue;
                    }
                }
                match inner.load_state(&tab_id).await {
                    Ok(LoadState::Complete) => {
                        debug!(tab_id = %tab_id, "tab finished loading");
                        let _ = status_tx.send(TabStatusEvent::Complete { tab_id });
                        return;
                    }
                    Ok(LoadState::Loading) => {}
                    // the execution context is replaced while navigating
                    Err(e) => trace!(tab_id = %tab_id, error = %e, "readyState poll"),
                }
            }
        });
    }
}

#[async_trait]
impl TabHost for CdpTabHost {
    async fn find_by_url(&self, url: &str) -> Result<Option<TabHandle>, TabError> {
        let pages = self.inner.client.list_pages().await?;
        let Some(info) = pages.into_iter().find(|p| p.url.starts_with(url)) else {
            return Ok(None);
        };
        let window_id = self.window_of(&info.id).await?;
        let tab_id = TabId::new(info.id.clone());
        let load_state = self.inner.load_state(&tab_id).await?;
        if load_state == LoadState::Loading {
            self.spawn_load_watcher(tab_id);
        }
        Ok(Some(handle_for(&info, window_id, load_state)))
    }

    async fn focus(&self, tab: &TabHandle) -> Result<(), TabError> {
        self.inner.client.activate(tab.tab_id.as_str()).await?;
        Ok(())
    }

    async fn create(&self, url: &str) -> Result<TabHandle, TabError> {
        let info = self.inner.client.new_page(url).await?;
        let window_id = self.window_of(&info.id).await?;
        let handle = handle_for(&info, window_id, LoadState::Loading);
        // the new target reports its own url as about:blank until navigation commits
        let handle = TabHandle {
            url: url.to_string(),
            ..handle
        };
        let _ = self.status_tx.send(TabStatusEvent::Loading {
            tab_id: handle.tab_id.clone(),
        });
        self.spawn_load_watcher(handle.tab_id.clone());
        Ok(handle)
    }

    fn status_events(&self) -> broadcast::Receiver<TabStatusEvent> {
        self.status_tx.subscribe()
    }

    async fn page(&self, tab: &TabHandle) -> Result<Arc<dyn PageContext>, TabError> {
        let session = self.inner.session_for(&tab.tab_id).await?;
        Ok(Arc::new(CdpPage::new(
            Arc::clone(&self.inner.client),
            tab.tab_id.as_str().to_string(),
            session,
        )))
    }
}

fn handle_for(info: &PageInfo, window_id: WindowId, load_state: LoadState) -> TabHandle {
    TabHandle::new(TabId::new(info.id.clone()), window_id, info.url.clone(), load_state)
}

fn load_state_of(loaded: &Value) -> LoadState {
    match loaded.as_bool() {
        Some(true) => LoadState::Complete,
        _ => LoadState::Loading,
    }
}
