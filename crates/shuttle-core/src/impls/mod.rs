//! Impls - ports の実装（シミュレーション・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryBrowser**: スクリプト化された TabHost + PageContext
//! - **TracingEventSink** / **RecordingEventSink**: EventSink
//!
//! # 本番用実装
//! 本番用のブラウザ実装は別クレートに配置します：
//! - `shuttle-cdp`: Chrome DevTools Protocol

pub mod events;
pub mod sim;

pub use self::events::{RecordingEventSink, TracingEventSink};
pub use self::sim::{InMemoryBrowser, PageAction, PageTemplate, SimPage};
