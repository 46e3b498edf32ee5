//! Fixed-delay retry policy.

use std::time::Duration;

/// What to do with an item whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue with the next attempt number.
    Retry { next_attempt: u32 },
    /// Retries exhausted; record a failed outcome and continue.
    Record,
    /// Retries exhausted; abort the whole batch.
    Abort,
}

/// Stateless retry policy: classifies failures and paces retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Minimum time between a failure and the retry's dispatch.
    pub delay: Duration,
    /// Exhausted items are recorded rather than fatal.
    pub ignore_failures: bool,
}

impl RetryPolicy {
    /// Classify the failure of zero-based `attempt`.
    pub fn decide(&self, attempt: u32) -> RetryDecision {
        if attempt < self.max_retries {
            RetryDecision::Retry {
                next_attempt: attempt + 1,
            }
        } else if self.ignore_failures {
            RetryDecision::Record
        } else {
            RetryDecision::Abort
        }
    }

    /// Backoff still owed after `spent` was already used handling the failure.
    pub fn remaining_delay(&self, spent: Duration) -> Duration {
        self.delay.saturating_sub(spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32, ignore_failures: bool) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::from_millis(100),
            ignore_failures,
        }
    }

    #[test]
    fn retries_until_budget_spent() {
        let p = policy(2, false);
        assert_eq!(p.decide(0), RetryDecision::Retry { next_attempt: 1 });
        assert_eq!(p.decide(1), RetryDecision::Retry { next_attempt: 2 });
        assert_eq!(p.decide(2), RetryDecision::Abort);
    }

    #[test]
    fn zero_retries_fails_immediately() {
        assert_eq!(policy(0, false).decide(0), RetryDecision::Abort);
        assert_eq!(policy(0, true).decide(0), RetryDecision::Record);
    }

    #[test]
    fn remaining_delay_subtracts_handling_time() {
        let p = policy(1, true);
        assert_eq!(
            p.remaining_delay(Duration::from_millis(30)),
            Duration::from_millis(70)
        );
        assert_eq!(p.remaining_delay(Duration::from_millis(250)), Duration::ZERO);
    }
}
