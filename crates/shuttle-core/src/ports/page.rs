//! PageContext port - 生きている document への操作
//!
//! Every call addresses elements by CSS selector and is answered by the page
//! at call time; nothing is cached between calls because the page re-renders
//! asynchronously.

use async_trait::async_trait;

use crate::domain::PageError;

#[async_trait]
pub trait PageContext: Send + Sync {
    /// Does `selector` currently match an element?
    async fn exists(&self, selector: &str) -> Result<bool, PageError>;

    /// Write `value` into the first match and fire bubbling `input` and
    /// `change` events. `Ok(false)` when nothing matched.
    async fn set_value(&self, selector: &str, value: &str) -> Result<bool, PageError>;

    /// Click the first match. `Ok(false)` when nothing matched.
    async fn click(&self, selector: &str) -> Result<bool, PageError>;

    /// `None` when nothing matched.
    async fn has_class(&self, selector: &str, class: &str) -> Result<Option<bool>, PageError>;

    /// Full document reload. Returns once the new document has loaded.
    async fn reload(&self) -> Result<(), PageError>;
}
