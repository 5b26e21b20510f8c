//! CDP protocol types and message definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CDP request message.
#[derive(Debug, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP response or event message.
#[derive(Debug, Deserialize)]
pub struct CdpResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorResponse>,
    pub method: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CdpErrorResponse {
    pub code: i64,
    pub message: String,
}

/// Target entry from the `/json/list` and `/json/new` endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub page_type: String,
    #[serde(default)]
    pub title: String,
    pub url: String,
}

impl PageInfo {
    pub fn is_page(&self) -> bool {
        self.page_type == "page"
    }
}

/// Browser version info.
///
/// Note: Chrome returns PascalCase field names for this endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_empty_fields() {
        let req = CdpRequest {
            id: 7,
            method: "Page.reload".to_string(),
            params: None,
            session_id: None,
        };
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"id":7,"method":"Page.reload"}"#
        );
    }

    #[test]
    fn request_carries_session_id() {
        let req = CdpRequest {
            id: 1,
            method: "Runtime.evaluate".to_string(),
            params: Some(serde_json::json!({"expression": "1"})),
            session_id: Some("S1".to_string()),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["sessionId"], "S1");
    }

    #[test]
    fn error_response_parses() {
        let resp: CdpResponse = serde_json::from_str(
            r#"{"id":3,"error":{"code":-32000,"message":"Target closed"}}"#,
        )
        .unwrap();
        assert_eq!(resp.id, Some(3));
        assert_eq!(resp.error.unwrap().message, "Target closed");
    }

    #[test]
    fn event_has_no_id() {
        let resp: CdpResponse = serde_json::from_str(
            r#"{"method":"Page.loadEventFired","params":{"timestamp":1.0},"sessionId":"S1"}"#,
        )
        .unwrap();
        assert!(resp.id.is_none());
        assert_eq!(resp.method.as_deref(), Some("Page.loadEventFired"));
    }

    #[test]
    fn page_info_parses_json_list_entry() {
        let pages: Vec<PageInfo> = serde_json::from_str(
            r#"[
                {"id":"A1","type":"page","title":"Chat","url":"https://aistudio.google.com/prompts/new_chat"},
                {"id":"W1","type":"service_worker","url":"https://example.test/sw.js"}
            ]"#,
        )
        .unwrap();
        assert!(pages[0].is_page());
        assert!(!pages[1].is_page());
        assert_eq!(pages[1].title, "");
    }

    #[test]
    fn browser_version_uses_pascal_case() {
        let v: BrowserVersion = serde_json::from_str(
            r#"{"Browser":"Chrome/126.0","Protocol-Version":"1.3","webSocketDebuggerUrl":"ws://127.0.0.1:9222/devtools/browser/x"}"#,
        )
        .unwrap();
        assert_eq!(v.browser, "Chrome/126.0");
        assert!(v.web_socket_debugger_url.starts_with("ws://"));
    }
}
