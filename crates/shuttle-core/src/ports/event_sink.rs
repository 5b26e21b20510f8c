//! EventSink port - イベント記録の抽象化
//!
//! # 実装
//! - TracingEventSink: tracing に構造化ログとして出す（デフォルト）
//! - RecordingEventSink: メモリに溜める（テスト用）

use crate::domain::DomainEvent;

/// EventSink はドメインイベントを記録
///
/// `emit` must not block: it is called from inside the Coordinator driver
/// and the Task Runner.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}
