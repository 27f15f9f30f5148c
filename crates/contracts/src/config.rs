//! NotifyConfig - Config Loader output
//!
//! Retry policy, transport timeout, timer-wheel sizing and the notifiers to
//! register, each with the source kinds it handles.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SourceKind;

/// Complete notification configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Retry policy for failed deliveries
    #[serde(default)]
    pub retry: RetryConfig,

    /// Transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Retry timer settings
    #[serde(default)]
    pub timer: TimerConfig,

    /// Notifiers to register
    #[serde(default = "default_notifiers")]
    pub notifiers: Vec<NotifierConfig>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            transport: TransportConfig::default(),
            timer: TimerConfig::default(),
            notifiers: default_notifiers(),
        }
    }
}

/// Delivery retry policy
///
/// Delay before retry `n` (1-based) is
/// `first_delay_ms + increment_delay_ms * (n - 1)`, floored at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Failures tolerated before an attempt is given up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_first_delay_ms")]
    pub first_delay_ms: u64,

    /// Added per subsequent retry, in milliseconds (may be negative)
    #[serde(default = "default_increment_delay_ms")]
    pub increment_delay_ms: i64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            first_delay_ms: default_first_delay_ms(),
            increment_delay_ms: default_increment_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    10
}

fn default_first_delay_ms() -> u64 {
    3000
}

fn default_increment_delay_ms() -> i64 {
    3000
}

/// Transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Response timeout per send, in milliseconds
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

impl TransportConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

fn default_response_timeout_ms() -> u64 {
    3000
}

/// Hashed wheel timer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Wheel tick, in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Buckets per wheel revolution (rounded up to a power of two)
    #[serde(default = "default_ticks_per_wheel")]
    pub ticks_per_wheel: usize,

    /// Maximum timers accepted but not yet placed on the wheel
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Maximum expired tasks executing at once
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
}

impl TimerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            ticks_per_wheel: default_ticks_per_wheel(),
            max_pending: default_max_pending(),
            worker_concurrency: default_worker_concurrency(),
        }
    }
}

fn default_tick_ms() -> u64 {
    100
}

fn default_ticks_per_wheel() -> usize {
    1024
}

fn default_max_pending() -> usize {
    65_536
}

fn default_worker_concurrency() -> usize {
    64
}

/// One notifier registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Notifier name (used for logging/metrics)
    pub name: String,

    /// Source kinds routed to this notifier
    pub kinds: Vec<SourceKind>,
}

impl NotifierConfig {
    /// Kinds as a set
    pub fn kind_set(&self) -> HashSet<SourceKind> {
        self.kinds.iter().copied().collect()
    }
}

fn default_notifiers() -> Vec<NotifierConfig> {
    vec![NotifierConfig {
        name: "session".to_string(),
        kinds: vec![SourceKind::Publish, SourceKind::Synchronize],
    }]
}
