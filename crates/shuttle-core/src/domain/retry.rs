//! Retry policy: how many reload-and-retry cycles a task gets, and how long
//! to back off before each reload.

use std::time::Duration;

/// Retry policy for probe timeouts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts allowed per task, including the first one.
    /// `None` keeps reloading forever.
    pub max_attempts: Option<u32>,

    /// Delay before the first reload.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// 5 attempts, 1s base, doubling.
    pub fn bounded_default() -> Self {
        Self {
            max_attempts: Some(5),
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }

    /// Reload immediately and never give up.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Is another attempt allowed after `attempts` have already run?
    pub fn allows_another(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts < max,
            None => true,
        }
    }

    /// Delay before the reload that follows attempt number `attempts` (1-indexed).
    ///
    /// delay = base_delay * multiplier^(attempts - 1)
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = base_secs * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay_secs).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bounded_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_increases() {
        let policy = RetryPolicy::bounded_default();

        assert_eq!(policy.next_delay(1), Duration::from_secs(1));
        assert_eq!(policy.next_delay(2), Duration::from_secs(2));
        assert_eq!(policy.next_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn zero_attempts_uses_base_delay() {
        let policy = RetryPolicy::bounded_default();
        assert_eq!(policy.next_delay(0), policy.base_delay);
    }

    #[test]
    fn bounded_policy_stops_at_max() {
        let policy = RetryPolicy {
            max_attempts: Some(2),
            ..RetryPolicy::bounded_default()
        };
        assert!(policy.allows_another(1));
        assert!(!policy.allows_another(2));
    }

    #[test]
    fn unbounded_policy_never_stops() {
        let policy = RetryPolicy::unbounded();
        assert!(policy.allows_another(10_000));
        assert_eq!(policy.next_delay(7), Duration::ZERO);
    }

    #[test]
    fn huge_exponent_saturates() {
        let policy = RetryPolicy {
            max_attempts: None,
            base_delay: Duration::from_secs(1),
            multiplier: 10.0,
        };
        assert_eq!(policy.next_delay(u32::MAX), Duration::MAX);
    }
}
