//! Config - TOML 設定
//!
//! Every section has defaults, so an empty file (or no file) gives the
//! stock behaviour for the target page.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::coordinator::CoordinatorConfig;
use crate::app::probe::PageProbe;
use crate::app::sequence::SequencePlan;
use crate::domain::{RetryPolicy, TabPolicy};

pub const DEFAULT_TARGET_URL: &str = "https://aistudio.google.com/prompts/new_chat";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShuttleConfig {
    pub target_url: String,
    /// Per-task bound, acquisition to signal. Absent = wait forever.
    pub task_timeout_ms: Option<u64>,
    pub probe: ProbeConfig,
    pub runner: RunnerConfig,
    pub tabs: TabsConfig,
    pub sequence: SequencePlan,
}

impl Default for ShuttleConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            task_timeout_ms: None,
            probe: ProbeConfig::default(),
            runner: RunnerConfig::default(),
            tabs: TabsConfig::default(),
            sequence: SequencePlan::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    pub timeout_ms: u64,
    pub interval_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 20_000,
            interval_ms: 500,
        }
    }
}

/// Task Runner settings.
///
/// When the `[runner]` table is written, an omitted `max_attempts` means
/// "reload forever". Without the table the bounded default (5) applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default = "default_reload_base_delay_ms")]
    pub reload_base_delay_ms: u64,
    #[serde(default = "default_reload_multiplier")]
    pub reload_multiplier: f64,
}

fn default_settle_delay_ms() -> u64 {
    300
}

fn default_reload_base_delay_ms() -> u64 {
    1_000
}

fn default_reload_multiplier() -> f64 {
    2.0
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            max_attempts: Some(5),
            reload_base_delay_ms: default_reload_base_delay_ms(),
            reload_multiplier: default_reload_multiplier(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TabsConfig {
    pub single: TabPolicy,
    pub batch: TabPolicy,
}

impl Default for TabsConfig {
    fn default() -> Self {
        Self {
            single: TabPolicy::ReuseExisting,
            batch: TabPolicy::AlwaysNew,
        }
    }
}

impl ShuttleConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn load_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_url.trim().is_empty() {
            return Err(ConfigError::invalid("target_url", "must not be empty"));
        }
        if self.task_timeout_ms == Some(0) {
            return Err(ConfigError::invalid("task_timeout_ms", "must be positive"));
        }
        if self.probe.interval_ms == 0 {
            return Err(ConfigError::invalid("probe.interval_ms", "must be positive"));
        }
        if self.probe.timeout_ms < self.probe.interval_ms {
            return Err(ConfigError::invalid(
                "probe.timeout_ms",
                format!(
                    "must be at least probe.interval_ms ({})",
                    self.probe.interval_ms
                ),
            ));
        }
        if self.runner.max_attempts == Some(0) {
            return Err(ConfigError::invalid("runner.max_attempts", "must be at least 1"));
        }
        if self.runner.reload_multiplier.is_nan() || self.runner.reload_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "runner.reload_multiplier",
                "must be at least 1.0",
            ));
        }
        if self.sequence.prompt_input.trim().is_empty() {
            return Err(ConfigError::invalid("sequence.prompt_input", "must not be empty"));
        }
        if self.sequence.submit.trim().is_empty() {
            return Err(ConfigError::invalid("sequence.submit", "must not be empty"));
        }
        for (i, step) in self.sequence.controls.iter().enumerate() {
            if step.selectors().iter().any(|s| s.trim().is_empty()) {
                return Err(ConfigError::invalid(
                    &format!("sequence.controls[{i}]"),
                    "selectors must not be empty",
                ));
            }
        }
        Ok(())
    }

    pub fn probe(&self) -> PageProbe {
        PageProbe::new(
            Duration::from_millis(self.probe.interval_ms),
            Duration::from_millis(self.probe.timeout_ms),
        )
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.runner.settle_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.runner.max_attempts,
            base_delay: Duration::from_millis(self.runner.reload_base_delay_ms),
            multiplier: self.runner.reload_multiplier,
        }
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            task_timeout: self.task_timeout_ms.map(Duration::from_millis),
            single_policy: self.tabs.single,
            batch_policy: self.tabs.batch,
        }
    }
}
