//! Decision model: what the Task Runner does after an attempt.
//!
//! This module defines the Decision type (what to do next) and the Decider trait
//! (how to determine it from the attempt number and the sequence outcome).

use std::time::Duration;

use super::outcome::SequenceOutcome;
use super::retry::RetryPolicy;

/// The next action for the task currently owned by a Task Runner.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Emit `sequenceComplete`.
    Complete,

    /// Reload the page after `delay` and run the whole sequence again.
    Reload { delay: Duration, reason: String },

    /// Give up and emit `sequenceFailed`.
    Fail { reason: String },
}

impl Decision {
    /// Name recorded in `DecisionRecord::decision`.
    pub fn name(&self) -> &'static str {
        match self {
            Decision::Complete => "complete",
            Decision::Reload { .. } => "reload_and_retry",
            Decision::Fail { .. } => "fail",
        }
    }
}

/// Deciders are pure functions: given the attempt count and the outcome of
/// the latest attempt, they return the next action without side effects.
pub trait Decider: Send + Sync {
    /// `attempt` is 1-indexed and counts the attempt that produced `outcome`.
    fn decide(&self, attempt: u32, outcome: &SequenceOutcome) -> Decision;

    /// Policy name recorded alongside each decision.
    fn policy_name(&self) -> &'static str {
        "custom"
    }
}

/// Default decider.
///
/// - Success → Complete
/// - TimeoutFailure → Reload while the retry policy allows another attempt
/// - OtherFailure → Fail (retrying an unclassified fault is not assumed safe)
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Default for DefaultDecider {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, attempt: u32, outcome: &SequenceOutcome) -> Decision {
        match outcome {
            SequenceOutcome::Success => Decision::Complete,
            SequenceOutcome::TimeoutFailure { selector } => {
                if self.retry_policy.allows_another(attempt) {
                    let delay = self.retry_policy.next_delay(attempt);
                    let reason = match self.retry_policy.max_attempts {
                        Some(max) => format!(
                            "element {selector:?} did not appear; retry {}/{max} after {delay:?}",
                            attempt + 1
                        ),
                        None => format!(
                            "element {selector:?} did not appear; retry {} after {delay:?}",
                            attempt + 1
                        ),
                    };
                    Decision::Reload { delay, reason }
                } else {
                    Decision::Fail {
                        reason: format!(
                            "element {selector:?} did not appear after {attempt} attempts"
                        ),
                    }
                }
            }
            SequenceOutcome::OtherFailure { message } => Decision::Fail {
                reason: message.clone(),
            },
        }
    }

    fn policy_name(&self) -> &'static str {
        "retry_policy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decider(max_attempts: Option<u32>) -> DefaultDecider {
        DefaultDecider::new(RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
        })
    }

    #[test]
    fn success_completes() {
        assert_eq!(
            decider(Some(3)).decide(1, &SequenceOutcome::Success),
            Decision::Complete
        );
    }

    #[rstest]
    #[case::first(1, Duration::from_millis(500))]
    #[case::second(2, Duration::from_millis(1000))]
    fn timeout_reloads_with_backoff(#[case] attempt: u32, #[case] expected: Duration) {
        let decision = decider(Some(3)).decide(attempt, &SequenceOutcome::timeout("textarea"));
        match decision {
            Decision::Reload { delay, reason } => {
                assert_eq!(delay, expected);
                assert!(reason.contains("textarea"));
            }
            other => panic!("expected reload, got {other:?}"),
        }
    }

    #[test]
    fn timeout_on_last_attempt_fails() {
        let decision = decider(Some(3)).decide(3, &SequenceOutcome::timeout("textarea"));
        assert!(matches!(decision, Decision::Fail { reason } if reason.contains("3 attempts")));
    }

    #[test]
    fn unbounded_policy_keeps_reloading() {
        let decision = decider(None).decide(50, &SequenceOutcome::timeout("textarea"));
        assert_eq!(decision.name(), "reload_and_retry");
    }

    #[test]
    fn other_failure_is_not_retried() {
        let decision = decider(Some(3)).decide(1, &SequenceOutcome::other("script threw"));
        assert_eq!(
            decision,
            Decision::Fail {
                reason: "script threw".to_string()
            }
        );
    }
}
