//! CDP error types.

use shuttle_core::domain::{PageError, TabError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdpError {
    /// Chrome not found or not running with remote debugging.
    #[error("Chrome not available at {0}. Start Chrome with: chrome --remote-debugging-port=9222")]
    ChromeNotAvailable(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error (endpoint discovery, /json/list, /json/new).
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JavaScript error: {0}")]
    JavaScript(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}

impl From<CdpError> for PageError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::JavaScript(message) => PageError::Script(message),
            CdpError::SessionClosed => PageError::Detached("CDP session closed".to_string()),
            other => PageError::Transport(other.to_string()),
        }
    }
}

impl From<CdpError> for TabError {
    fn from(e: CdpError) -> Self {
        TabError::Browser(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_not_available_mentions_flag() {
        let err = CdpError::ChromeNotAvailable("http://localhost:9222".to_string());
        assert!(err.to_string().contains("--remote-debugging-port"));
    }

    #[test]
    fn javascript_errors_become_script_errors() {
        let err: PageError = CdpError::JavaScript("Uncaught TypeError".to_string()).into();
        assert_eq!(err, PageError::Script("Uncaught TypeError".to_string()));
    }

    #[test]
    fn closed_session_detaches_page() {
        let err: PageError = CdpError::SessionClosed.into();
        assert!(matches!(err, PageError::Detached(_)));
    }

    #[test]
    fn protocol_errors_are_transport_errors() {
        let err: PageError = CdpError::Protocol {
            code: -32000,
            message: "No target with given id".to_string(),
        }
        .into();
        assert!(matches!(err, PageError::Transport(m) if m.contains("-32000")));
    }

    #[test]
    fn tab_errors_keep_message() {
        let err: TabError = CdpError::Http("connection refused".to_string()).into();
        assert!(err.to_string().contains("connection refused"));
    }
}
