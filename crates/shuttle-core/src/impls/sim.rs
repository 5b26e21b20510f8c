//! InMemoryBrowser - シミュレーション用ブラウザ
//!
//! A scripted `TabHost` + `PageContext` pair. A `PageTemplate` describes which
//! selectors exist and when, so tests can reproduce slow renders, missing
//! controls, pages that only work after a reload, and script faults.
//! All timing uses `tokio::time`, so paused-clock tests run instantly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use crate::app::sequence::{ControlStep, SequencePlan};
use crate::domain::{LoadState, PageError, TabError, TabHandle, TabId, TabStatusEvent, WindowId};
use crate::ports::{PageContext, TabHost};

#[derive(Debug, Clone, Copy, Default)]
struct ElementSpec {
    /// Measured from the moment the document finished loading.
    appears_after: Duration,
    visible_for: Option<Duration>,
    /// Absent for the first N documents of a tab (load 0 is the initial one).
    missing_for_loads: u32,
}

/// What the simulated page looks like.
#[derive(Debug, Clone, Default)]
pub struct PageTemplate {
    elements: HashMap<String, ElementSpec>,
    classes: HashMap<String, HashSet<String>>,
    click_effects: HashMap<String, (String, String)>,
    failures: HashMap<String, String>,
    load_delay: Duration,
}

impl PageTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every selector `plan` touches is present, and clicking an `Expand`
    /// header adds the expanded class to its container.
    pub fn from_plan(plan: &SequencePlan) -> Self {
        let mut template = Self::new()
            .with_element(&plan.prompt_input)
            .with_element(&plan.submit);
        for step in &plan.controls {
            template = match step {
                ControlStep::SetValue { selector, .. } | ControlStep::Click { selector } => {
                    template.with_element(selector)
                }
                ControlStep::Expand {
                    container,
                    header,
                    expanded_class,
                } => template
                    .with_element(container)
                    .with_element(header)
                    .on_click_add_class(header, container, expanded_class),
            };
        }
        template
    }

    pub fn with_element(mut self, selector: &str) -> Self {
        self.elements.entry(selector.to_string()).or_default();
        self
    }

    pub fn with_delayed_element(mut self, selector: &str, delay: Duration) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .appears_after = delay;
        self
    }

    /// Present for `visible_for` after load, then gone.
    pub fn with_vanishing_element(mut self, selector: &str, visible_for: Duration) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .visible_for = Some(visible_for);
        self
    }

    /// Absent until the tab has been reloaded `loads` times.
    pub fn with_element_missing_for_loads(mut self, selector: &str, loads: u32) -> Self {
        self.elements
            .entry(selector.to_string())
            .or_default()
            .missing_for_loads = loads;
        self
    }

    pub fn without_element(mut self, selector: &str) -> Self {
        self.elements.remove(selector);
        self
    }

    pub fn with_class(mut self, selector: &str, class: &str) -> Self {
        self.classes
            .entry(selector.to_string())
            .or_default()
            .insert(class.to_string());
        self
    }

    pub fn on_click_add_class(mut self, clicked: &str, target: &str, class: &str) -> Self {
        self.click_effects
            .insert(clicked.to_string(), (target.to_string(), class.to_string()));
        self
    }

    /// Any operation on `selector` fails with a script error.
    pub fn failing_on(mut self, selector: &str, message: &str) -> Self {
        self.failures
            .insert(selector.to_string(), message.to_string());
        self
    }

    /// Time between navigation start and `Complete`.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

/// A successful mutation observed by the simulated page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    SetValue { selector: String, value: String },
    Click { selector: String },
    Reload,
}

struct Document {
    load_index: u32,
    loaded_at: Instant,
    load_state: LoadState,
    classes: HashMap<String, HashSet<String>>,
}

pub struct SimPage {
    tab_id: TabId,
    template: Arc<PageTemplate>,
    document: Mutex<Document>,
    actions: Mutex<Vec<PageAction>>,
    reloads: AtomicU32,
    closed: AtomicBool,
    status_tx: broadcast::Sender<TabStatusEvent>,
}

impl SimPage {
    fn new(
        tab_id: TabId,
        template: Arc<PageTemplate>,
        status_tx: broadcast::Sender<TabStatusEvent>,
        load_state: LoadState,
    ) -> Self {
        let loaded_at = match load_state {
            LoadState::Complete => Instant::now(),
            LoadState::Loading => Instant::now() + template.load_delay,
        };
        Self {
            tab_id,
            document: Mutex::new(Document {
                load_index: 0,
                loaded_at,
                load_state,
                classes: template.classes.clone(),
            }),
            template,
            actions: Mutex::new(Vec::new()),
            reloads: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            status_tx,
        }
    }

    pub fn actions(&self) -> Vec<PageAction> {
        self.actions.lock().clone()
    }

    pub fn reload_count(&self) -> u32 {
        self.reloads.load(Ordering::Acquire)
    }

    fn load_state(&self) -> LoadState {
        self.document.lock().load_state
    }

    fn guard(&self, selector: &str) -> Result<(), PageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PageError::Detached(format!("tab {} was closed", self.tab_id)));
        }
        match self.template.failures.get(selector) {
            Some(message) => Err(PageError::Script(message.clone())),
            None => Ok(()),
        }
    }

    fn present(&self, document: &Document, selector: &str) -> bool {
        let Some(spec) = self.template.elements.get(selector) else {
            return false;
        };
        if document.load_index < spec.missing_for_loads {
            return false;
        }
        let Some(elapsed) = Instant::now().checked_duration_since(document.loaded_at) else {
            return false;
        };
        elapsed >= spec.appears_after && spec.visible_for.is_none_or(|v| elapsed < v)
    }

    fn mark_complete(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.document.lock().load_state = LoadState::Complete;
        let _ = self.status_tx.send(TabStatusEvent::Complete {
            tab_id: self.tab_id.clone(),
        });
    }
}

#[async_trait]
impl PageContext for SimPage {
    async fn exists(&self, selector: &str) -> Result<bool, PageError> {
        self.guard(selector)?;
        let document = self.document.lock();
        Ok(self.present(&document, selector))
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<bool, PageError> {
        self.guard(selector)?;
        if !self.present(&self.document.lock(), selector) {
            return Ok(false);
        }
        self.actions.lock().push(PageAction::SetValue {
            selector: selector.to_string(),
            value: value.to_string(),
        });
        Ok(true)
    }

    async fn click(&self, selector: &str) -> Result<bool, PageError> {
        self.guard(selector)?;
        {
            let mut document = self.document.lock();
            if !self.present(&document, selector) {
                return Ok(false);
            }
            if let Some((target, class)) = self.template.click_effects.get(selector) {
                document
                    .classes
                    .entry(target.clone())
                    .or_default()
                    .insert(class.clone());
            }
        }
        self.actions.lock().push(PageAction::Click {
            selector: selector.to_string(),
        });
        Ok(true)
    }

    async fn has_class(&self, selector: &str, class: &str) -> Result<Option<bool>, PageError> {
        self.guard(selector)?;
        let document = self.document.lock();
        if !self.present(&document, selector) {
            return Ok(None);
        }
        Ok(Some(
            document
                .classes
                .get(selector)
                .is_some_and(|classes| classes.contains(class)),
        ))
    }

    async fn reload(&self) -> Result<(), PageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PageError::Detached(format!("tab {} was closed", self.tab_id)));
        }
        self.reloads.fetch_add(1, Ordering::AcqRel);
        self.actions.lock().push(PageAction::Reload);
        {
            let mut document = self.document.lock();
            document.load_index += 1;
            document.loaded_at = Instant::now() + self.template.load_delay;
            document.load_state = LoadState::Loading;
            document.classes = self.template.classes.clone();
        }
        let _ = self.status_tx.send(TabStatusEvent::Loading {
            tab_id: self.tab_id.clone(),
        });

        tokio::time::sleep(self.template.load_delay).await;
        if self.closed.load(Ordering::Acquire) {
            return Err(PageError::Detached(format!(
                "tab {} was closed during reload",
                self.tab_id
            )));
        }
        self.mark_complete();
        Ok(())
    }
}

struct SimTab {
    url: String,
    page: Arc<SimPage>,
    open: bool,
}

#[derive(Default)]
struct BrowserState {
    tabs: Vec<SimTab>,
    focused: Option<TabId>,
}

/// A browser with one window whose tabs all render `template`.
pub struct InMemoryBrowser {
    template: Arc<PageTemplate>,
    state: Mutex<BrowserState>,
    status_tx: broadcast::Sender<TabStatusEvent>,
    window_id: WindowId,
}

impl InMemoryBrowser {
    pub fn new(template: PageTemplate) -> Self {
        let (status_tx, _) = broadcast::channel(64);
        Self {
            template: Arc::new(template),
            state: Mutex::new(BrowserState::default()),
            status_tx,
            window_id: WindowId::new("sim-window-1"),
        }
    }

    fn handle(&self, tab: &SimTab) -> TabHandle {
        TabHandle::new(
            tab.page.tab_id.clone(),
            self.window_id.clone(),
            tab.url.clone(),
            tab.page.load_state(),
        )
    }

    fn open_tab(&self, url: &str, load_state: LoadState) -> (TabHandle, Arc<SimPage>) {
        let mut state = self.state.lock();
        let tab_id = TabId::new(format!("sim-tab-{}", state.tabs.len() + 1));
        let page = Arc::new(SimPage::new(
            tab_id,
            Arc::clone(&self.template),
            self.status_tx.clone(),
            load_state,
        ));
        let tab = SimTab {
            url: url.to_string(),
            page: Arc::clone(&page),
            open: true,
        };
        let handle = self.handle(&tab);
        state.tabs.push(tab);
        (handle, page)
    }

    /// Open a tab that is already loaded, as if the operator had it open.
    pub fn seed_tab(&self, url: &str) -> TabHandle {
        let (handle, _) = self.open_tab(url, LoadState::Complete);
        let _ = self.status_tx.send(TabStatusEvent::Complete {
            tab_id: handle.tab_id.clone(),
        });
        handle
    }

    /// Close a tab the way a user would.
    pub fn close(&self, tab_id: &TabId) {
        let closed = {
            let mut state = self.state.lock();
            match state
                .tabs
                .iter_mut()
                .find(|t| t.open && t.page.tab_id == *tab_id)
            {
                Some(tab) => {
                    tab.open = false;
                    tab.page.closed.store(true, Ordering::Release);
                    true
                }
                None => false,
            }
        };
        if closed {
            let _ = self.status_tx.send(TabStatusEvent::Removed {
                tab_id: tab_id.clone(),
            });
        }
    }

    /// Tabs ever opened, in creation order.
    pub fn tab_count(&self) -> usize {
        self.state.lock().tabs.len()
    }

    pub fn tabs(&self) -> Vec<TabHandle> {
        let state = self.state.lock();
        state.tabs.iter().map(|t| self.handle(t)).collect()
    }

    pub fn focused(&self) -> Option<TabId> {
        self.state.lock().focused.clone()
    }

    pub fn actions(&self, tab_id: &TabId) -> Vec<PageAction> {
        self.sim_page(tab_id)
            .map(|page| page.actions())
            .unwrap_or_default()
    }

    pub fn reload_count(&self, tab_id: &TabId) -> u32 {
        self.sim_page(tab_id)
            .map(|page| page.reload_count())
            .unwrap_or_default()
    }

    pub fn sim_page(&self, tab_id: &TabId) -> Option<Arc<SimPage>> {
        let state = self.state.lock();
        state
            .tabs
            .iter()
            .find(|t| t.page.tab_id == *tab_id)
            .map(|t| Arc::clone(&t.page))
    }
}

#[async_trait]
impl TabHost for InMemoryBrowser {
    async fn find_by_url(&self, url: &str) -> Result<Option<TabHandle>, TabError> {
        let state = self.state.lock();
        Ok(state
            .tabs
            .iter()
            .find(|t| t.open && t.url.starts_with(url))
            .map(|t| self.handle(t)))
    }

    async fn focus(&self, tab: &TabHandle) -> Result<(), TabError> {
        let mut state = self.state.lock();
        match state.tabs.iter().find(|t| t.page.tab_id == tab.tab_id) {
            Some(t) if t.open => {
                state.focused = Some(tab.tab_id.clone());
                Ok(())
            }
            Some(_) => Err(TabError::Closed(tab.tab_id.clone())),
            None => Err(TabError::NotFound(tab.tab_id.clone())),
        }
    }

    async fn create(&self, url: &str) -> Result<TabHandle, TabError> {
        let (handle, page) = self.open_tab(url, LoadState::Loading);
        let _ = self.status_tx.send(TabStatusEvent::Loading {
            tab_id: handle.tab_id.clone(),
        });
        debug!(tab_id = %handle.tab_id, url, "simulated tab opened");

        let delay = self.template.load_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            page.mark_complete();
        });

        Ok(handle)
    }

    fn status_events(&self) -> broadcast::Receiver<TabStatusEvent> {
        self.status_tx.subscribe()
    }

    async fn page(&self, tab: &TabHandle) -> Result<Arc<dyn PageContext>, TabError> {
        let state = self.state.lock();
        match state.tabs.iter().find(|t| t.page.tab_id == tab.tab_id) {
            Some(t) if t.open => {
                let page: Arc<dyn PageContext> = t.page.clone();
                Ok(page)
            }
            Some(_) => Err(TabError::Closed(tab.tab_id.clone())),
            None => Err(TabError::NotFound(tab.tab_id.clone())),
        }
    }
}
