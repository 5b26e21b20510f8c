//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 設定が不正なら何も spawn しない

use std::sync::Arc;

use crate::app::coordinator::{Coordinator, CoordinatorDeps};
use crate::app::dispatch::LocalDispatch;
use crate::app::runner::TaskRunner;
use crate::app::sequence::SequenceExecutor;
use crate::app::signal_bus::SignalBus;
use crate::app::tabs::TabLifecycleManager;
use crate::config::{ConfigError, ShuttleConfig};
use crate::domain::{Decider, DefaultDecider};
use crate::impls::TracingEventSink;
use crate::ports::{Clock, EventSink, IdGenerator, SystemClock, TabHost, UlidGenerator};

/// AppBuilder はアプリケーションを構築
///
/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(Arc::new(browser))
///     .config(ShuttleConfig::load(path)?)
///     .build()?;
/// app.coordinator.submit_batch(["prompt-A", "prompt-B"])?;
/// app.coordinator.wait_idle().await?;
/// ```
pub struct AppBuilder {
    host: Arc<dyn TabHost>,
    config: ShuttleConfig,
    events: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
    decider: Option<Arc<dyn Decider>>,
}

/// BuildError はアプリケーション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl AppBuilder {
    pub fn new(host: Arc<dyn TabHost>) -> Self {
        Self {
            host,
            config: ShuttleConfig::default(),
            events: None,
            clock: None,
            decider: None,
        }
    }

    pub fn config(mut self, config: ShuttleConfig) -> Self {
        self.config = config;
        self
    }

    /// Defaults to `TracingEventSink`.
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to `DefaultDecider` over the configured retry policy.
    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    /// Validate the configuration, wire every service, and spawn the
    /// coordinator driver. Must be called inside a tokio runtime.
    pub fn build(self) -> Result<App, BuildError> {
        self.config.validate()?;

        let events = self
            .events
            .unwrap_or_else(|| Arc::new(TracingEventSink) as Arc<dyn EventSink>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        let decider = self.decider.unwrap_or_else(|| {
            Arc::new(DefaultDecider::new(self.config.retry_policy())) as Arc<dyn Decider>
        });

        let executor = SequenceExecutor::new(
            self.config.sequence.clone(),
            self.config.probe(),
            self.config.settle_delay(),
            Arc::clone(&events),
        );
        let runner = Arc::new(TaskRunner::new(
            executor,
            decider,
            Arc::clone(&events),
            Arc::clone(&ids),
            Arc::clone(&clock),
        ));
        let signal_bus = Arc::new(SignalBus::new(Arc::clone(&events)));
        let dispatch = Arc::new(LocalDispatch::new(
            Arc::clone(&self.host),
            Arc::clone(&runner),
            Arc::clone(&signal_bus),
        ));

        let coordinator = Coordinator::spawn(
            self.config.coordinator(),
            CoordinatorDeps {
                tabs: TabLifecycleManager::new(self.host, self.config.target_url.clone()),
                dispatch,
                bus: Arc::clone(&signal_bus),
                events,
                ids,
                clock,
            },
        );

        Ok(App {
            coordinator,
            signal_bus,
            runner,
        })
    }
}

/// App は起動済みのアプリケーション
pub struct App {
    pub coordinator: Coordinator,
    pub signal_bus: Arc<SignalBus>,
    pub runner: Arc<TaskRunner>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryBrowser, PageTemplate};

    fn browser() -> Arc<dyn TabHost> {
        Arc::new(InMemoryBrowser::new(PageTemplate::new()))
    }

    #[tokio::test]
    async fn build_with_defaults() {
        let app = AppBuilder::new(browser()).build().unwrap();
        assert!(app.coordinator.status().is_idle());
        app.coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn build_rejects_invalid_config() {
        let mut config = ShuttleConfig::default();
        config.probe.interval_ms = 0;

        let result = AppBuilder::new(browser()).config(config).build();

        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::InvalidValue { field, .. }))
                if field == "probe.interval_ms"
        ));
    }
}
