//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: アプリケーションの構築とワイヤリング
//! - **Coordinator**: キューの所有と 1 タスクずつの駆動
//! - **TabLifecycleManager**: タブの取得と load 完了待ち
//! - **TaskRunner**: reload-and-retry を含む 1 タスク分の実行
//! - **SequenceExecutor** / **PageProbe**: ページ上の手順と要素待ち
//! - **SignalBus** / **LocalDispatch**: Runner 起動とシグナル配送

pub mod builder;
pub mod coordinator;
pub mod dispatch;
pub mod probe;
pub mod runner;
pub mod sequence;
pub mod signal_bus;
pub mod tabs;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::coordinator::{Coordinator, CoordinatorConfig, CoordinatorDeps};
pub use self::dispatch::LocalDispatch;
pub use self::probe::PageProbe;
pub use self::runner::TaskRunner;
pub use self::sequence::{ControlStep, SequenceExecutor, SequencePlan};
pub use self::signal_bus::{SignalBus, SignalSubscription};
pub use self::tabs::{AcquiredTab, LoadCompletion, TabLifecycleManager};
