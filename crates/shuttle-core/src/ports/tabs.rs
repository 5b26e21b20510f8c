//! TabHost port - ブラウザのタブ操作
//!
//! Raw browser operations. Locate-or-create policy and load-completion
//! futures are built on top of this by `app::tabs::TabLifecycleManager`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{TabError, TabHandle, TabStatusEvent};
use crate::ports::PageContext;

#[async_trait]
pub trait TabHost: Send + Sync {
    /// First tab currently showing `url`, if any.
    async fn find_by_url(&self, url: &str) -> Result<Option<TabHandle>, TabError>;

    /// Make the tab active and focus its window.
    async fn focus(&self, tab: &TabHandle) -> Result<(), TabError>;

    /// Open a new tab at `url`. The returned handle is `Loading`.
    async fn create(&self, url: &str) -> Result<TabHandle, TabError>;

    /// Navigation status changes for every tab.
    fn status_events(&self) -> broadcast::Receiver<TabStatusEvent>;

    /// The document currently loaded in `tab`.
    async fn page(&self, tab: &TabHandle) -> Result<Arc<dyn PageContext>, TabError>;
}
