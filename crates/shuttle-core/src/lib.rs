//! shuttle-core
//!
//! Orchestration core for driving a prompt page one task at a time.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, tab, outcome, message, state, retry, decision, attempt, events, errors）
//! - **ports**: 抽象化レイヤー（PageContext, TabHost, RunnerDispatch, EventSink, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（coordinator, tabs, runner, sequence, probe, signal_bus, builder）
//! - **impls**: 実装（InMemoryBrowser, EventSink 実装）
//! - **config**: TOML 設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{App, AppBuilder};
pub use config::{ConfigError, ShuttleConfig};
