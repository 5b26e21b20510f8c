//! CdpPage - PageContext over an attached CDP session.
//!
//! Every operation is one self-contained `Runtime.evaluate` expression.
//! Selectors and values are embedded as JSON string literals, which are
//! valid JavaScript string literals.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shuttle_core::domain::PageError;
use shuttle_core::ports::PageContext;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::client::CdpClient;
use crate::error::CdpError;

const RELOAD_MARKER: &str = "__shuttleReloadPending";
const RELOAD_POLL: Duration = Duration::from_millis(100);
const RELOAD_TIMEOUT: Duration = Duration::from_secs(30);

fn literal(s: &str) -> String {
    // serializing a &str cannot fail
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

pub(crate) mod script {
    use super::{RELOAD_MARKER, literal};

    pub fn exists(selector: &str) -> String {
        format!("document.querySelector({}) !== null", literal(selector))
    }

    pub fn set_value(selector: &str, value: &str) -> String {
        format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; \
             el.value = {}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            literal(selector),
            literal(value)
        )
    }

    pub fn click(selector: &str) -> String {
        format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; \
             el.click(); return true; }})()",
            literal(selector)
        )
    }

    pub fn has_class(selector: &str, class: &str) -> String {
        format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return null; \
             return el.classList.contains({}); }})()",
            literal(selector),
            literal(class)
        )
    }

    pub fn mark_for_reload() -> String {
        format!("window.{RELOAD_MARKER} = true")
    }

    /// True once a fresh document (without the marker) has fully loaded.
    pub fn reloaded() -> String {
        format!("window.{RELOAD_MARKER} === undefined && document.readyState === 'complete'")
    }

    /// True once the tab shows a real document that has fully loaded.
    /// A fresh target starts on `about:blank`, which is already complete.
    pub fn navigated_and_loaded() -> &'static str {
        "location.href !== 'about:blank' && document.readyState === 'complete'"
    }
}

pub struct CdpPage {
    client: Arc<CdpClient>,
    target_id: String,
    session_id: String,
}

impl CdpPage {
    pub fn new(client: Arc<CdpClient>, target_id: String, session_id: String) -> Self {
        Self {
            client,
            target_id,
            session_id,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    async fn eval(&self, expression: &str) -> Result<Value, CdpError> {
        trace!(target_id = %self.target_id, expression, "evaluate");
        self.client.evaluate(&self.session_id, expression).await
    }

    async fn eval_bool(&self, expression: &str) -> Result<bool, PageError> {
        match self.eval(expression).await? {
            Value::Bool(b) => Ok(b),
            other => Err(PageError::Script(format!("expected boolean, got {other}"))),
        }
    }
}

#[async_trait]
impl PageContext for CdpPage {
    async fn exists(&self, selector: &str) -> Result<bool, PageError> {
        self.eval_bool(&script::exists(selector)).await
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<bool, PageError> {
        self.eval_bool(&script::set_value(selector, value)).await
    }

    async fn click(&self, selector: &str) -> Result<bool, PageError> {
        self.eval_bool(&script::click(selector)).await
    }

    async fn has_class(&self, selector: &str, class: &str) -> Result<Option<bool>, PageError> {
        match self.eval(&script::has_class(selector, class)).await? {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(b)),
            other => Err(PageError::Script(format!(
                "expected boolean or null, got {other}"
            ))),
        }
    }

    async fn reload(&self) -> Result<(), PageError> {
        self.eval(&script::mark_for_reload()).await?;
        self.client
            .call("Page.reload", None, Some(&self.session_id))
            .await?;

        let started = Instant::now();
        loop {
            tokio::time::sleep(RELOAD_POLL).await;
            // evaluation fails while the old context is torn down; keep polling
            match self.eval(&script::reloaded()).await {
                Ok(Value::Bool(true)) => {
                    debug!(target_id = %self.target_id, "page reloaded");
                    return Ok(());
                }
                Ok(_) => {}
                Err(CdpError::SessionClosed) => {
                    return Err(PageError::Detached("CDP session closed".to_string()));
                }
                Err(e) => trace!(error = %e, "reload poll"),
            }
            if started.elapsed() >= RELOAD_TIMEOUT {
                return Err(PageError::Transport(format!(
                    "page did not finish reloading within {RELOAD_TIMEOUT:?}"
                )));
            }
        }
    }
}
