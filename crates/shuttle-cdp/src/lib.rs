//! shuttle-cdp - Chrome DevTools Protocol adapter
//!
//! Implements the `TabHost` and `PageContext` ports against a Chrome started
//! with `--remote-debugging-port`.

pub mod client;
pub mod error;
pub mod host;
pub mod page;
pub mod protocol;

pub use client::CdpClient;
pub use error::CdpError;
pub use host::CdpTabHost;
pub use page::CdpPage;
