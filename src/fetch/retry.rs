//! Rate-limit retry bookkeeping

use std::time::Duration;

/// Fixed retry parameters for one poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive rate-limited attempts before giving up
    pub max_attempts: u32,
    /// Pause between a rate-limited attempt and its retry
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// What to do after a rate-limited attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then repeat the same logical fetch
    Retry { attempt: u32, delay: Duration },
    /// Stop until the next poll cycle
    GiveUp { attempts: u32 },
}

/// Attempt counter, reset on every successful fetch
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    attempt: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Count a rate-limited attempt and decide whether to retry
    pub fn record_rate_limit(&mut self, policy: &RetryPolicy) -> RetryDecision {
        self.attempt = self.attempt.saturating_add(1);

        if self.attempt >= policy.max_attempts {
            RetryDecision::GiveUp {
                attempts: self.attempt,
            }
        } else {
            RetryDecision::Retry {
                attempt: self.attempt,
                delay: policy.retry_delay,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gives_up_at_max() {
        let policy = RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(10),
        };
        let mut state = RetryState::new();

        assert!(matches!(
            state.record_rate_limit(&policy),
            RetryDecision::Retry { attempt: 1, .. }
        ));
        assert!(matches!(
            state.record_rate_limit(&policy),
            RetryDecision::Retry { attempt: 2, .. }
        ));
        assert_eq!(
            state.record_rate_limit(&policy),
            RetryDecision::GiveUp { attempts: 3 }
        );
    }

    #[test]
    fn test_reset() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::new();
        state.record_rate_limit(&policy);
        state.reset();
        assert_eq!(state.attempt(), 0);
    }

    #[test]
    fn test_zero_max_gives_up_immediately() {
        let policy = RetryPolicy {
            max_attempts: 0,
            retry_delay: Duration::ZERO,
        };
        let mut state = RetryState::new();
        assert_eq!(
            state.record_rate_limit(&policy),
            RetryDecision::GiveUp { attempts: 1 }
        );
    }
}
