//! PageProbe - 要素の出現待ち
//!
//! Bounded polling for a selector on a live document. The first check happens
//! at call time, so an element that is already present resolves without any
//! sleep; after that the page is polled every `interval` until `timeout`.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::domain::ProbeError;
use crate::ports::PageContext;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProbe {
    interval: Duration,
    timeout: Duration,
}

impl PageProbe {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for `selector` with the configured timeout.
    pub async fn wait(&self, page: &dyn PageContext, selector: &str) -> Result<(), ProbeError> {
        self.wait_for(page, selector, self.timeout).await
    }

    pub async fn wait_for(
        &self,
        page: &dyn PageContext,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), ProbeError> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            if page.exists(selector).await? {
                trace!(selector, polls, "probe matched");
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ProbeError::Timeout {
                    selector: selector.to_string(),
                    timeout,
                });
            }

            trace!(selector, polls, ?elapsed, "probe miss");
            tokio::time::sleep(self.interval.min(timeout - elapsed)).await;
        }
    }
}

impl Default for PageProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_INTERVAL, DEFAULT_PROBE_TIMEOUT)
    }
}
