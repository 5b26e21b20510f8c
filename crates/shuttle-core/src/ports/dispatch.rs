//! RunnerDispatch port - Task Runner を tab に注入して起動する
//!
//! The Coordinator never runs the sequence itself. It hands the task to a
//! dispatcher and then waits for the matching signal on the `SignalBus`.

use async_trait::async_trait;

use crate::domain::{PromptTask, ShuttleError, TabHandle, TabId};

/// RunnerDispatch は tab 内で Task Runner を開始する
///
/// # 契約
/// - 起動したら即座に戻る（fire-and-forget）
/// - 結果はあとで `SignalEnvelope { origin: tab.tab_id, .. }` として届く
/// - `Err` は「起動できなかった」ことだけを意味する
/// - `cancel` 後はその tab の runner がページに触れない
#[async_trait]
pub trait RunnerDispatch: Send + Sync {
    async fn dispatch(&self, tab: &TabHandle, task: &PromptTask) -> Result<(), ShuttleError>;

    /// Stop the runner started in `tab`, if it is still running, and wait
    /// until it no longer touches the page. No-op otherwise.
    async fn cancel(&self, tab: &TabId);
}
