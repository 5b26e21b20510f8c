//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。ブラウザ（タブ・document）、
//! Task Runner の起動、イベント記録、時刻、ID 生成を trait として切り出します。
//!
//! 実装:
//! - `impls::InMemoryBrowser`（テスト・シミュレーション用）
//! - `shuttle-cdp` クレート（Chrome DevTools Protocol、本番用）

pub mod clock;
pub mod dispatch;
pub mod event_sink;
pub mod id_generator;
pub mod page;
pub mod tabs;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::dispatch::RunnerDispatch;
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::page::PageContext;
pub use self::tabs::TabHost;
