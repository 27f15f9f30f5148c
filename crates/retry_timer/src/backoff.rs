//! Retry budget and linear backoff schedule.

use std::time::Duration;

use contracts::RetryConfig;

/// Linearly growing retry delay
///
/// `delay(n) = first + increment * (n - 1)` for the `n`-th retry, floored at
/// zero so a negative increment cannot produce a negative delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    first_delay_ms: u64,
    increment_delay_ms: i64,
}

impl LinearBackoff {
    pub fn new(first_delay_ms: u64, increment_delay_ms: i64) -> Self {
        Self {
            first_delay_ms,
            increment_delay_ms,
        }
    }

    /// Delay before the `retry_count`-th retry (1-based; 0 is treated as 1)
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let steps = i128::from(retry_count.saturating_sub(1));
        let millis =
            i128::from(self.first_delay_ms) + i128::from(self.increment_delay_ms) * steps;
        let clamped = millis.clamp(0, i128::from(u64::MAX));
        Duration::from_millis(u64::try_from(clamped).unwrap_or(u64::MAX))
    }
}

/// What to do after a failed delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule the next send after the delay
    RetryAfter(Duration),
    /// Retry budget exhausted
    GiveUp,
}

/// Retry budget plus delay schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: LinearBackoff,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: LinearBackoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            LinearBackoff::new(config.first_delay_ms, config.increment_delay_ms),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &LinearBackoff {
        &self.backoff
    }

    /// Decide for an attempt whose retry counter was just incremented
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count > self.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.backoff.delay_for(retry_count))
        }
    }

    /// Full delay schedule, one entry per permitted retry
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_retries)
            .map(|n| self.backoff.delay_for(n))
            .collect()
    }
}
