//! Notifier metrics for observability
//!
//! Updated concurrently by every in-flight attempt, hence atomics only.

use std::sync::atomic::{AtomicU64, Ordering};

use observability::OutcomeCounts;

use crate::attempt::AttemptState;

/// Counters for a single notifier
#[derive(Debug, Default)]
pub struct NotifierMetrics {
    /// Changes fanned out
    fanout_count: AtomicU64,
    /// Delivery attempts created
    attempt_count: AtomicU64,
    /// Transport sends issued
    send_count: AtomicU64,
    /// Failed sends (transport error or non-success response)
    failure_count: AtomicU64,
    /// Retry timers scheduled
    retry_count: AtomicU64,
    /// Terminal outcomes
    succeeded: AtomicU64,
    connection_dead: AtomicU64,
    aborted: AtomicU64,
    exhausted: AtomicU64,
    rejected: AtomicU64,
}

impl NotifierMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_fanout_count(&self) {
        self.fanout_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_attempt_count(&self) {
        self.attempt_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_send_count(&self) {
        self.send_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retry_count(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a terminal state; non-terminal states are ignored
    pub fn record_terminal(&self, state: &AttemptState) {
        let counter = match state {
            AttemptState::Succeeded => &self.succeeded,
            AttemptState::ConnectionDead => &self.connection_dead,
            AttemptState::Aborted(_) => &self.aborted,
            AttemptState::Exhausted => &self.exhausted,
            AttemptState::SchedulerRejected => &self.rejected,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Attempts created but not yet terminal
    pub fn in_flight(&self) -> u64 {
        self.snapshot().in_flight()
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fanouts: self.fanout_count.load(Ordering::Relaxed),
            attempts: self.attempt_count.load(Ordering::Relaxed),
            sends: self.send_count.load(Ordering::Relaxed),
            failures: self.failure_count.load(Ordering::Relaxed),
            retries: self.retry_count.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            connection_dead: self.connection_dead.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of notifier metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub fanouts: u64,
    pub attempts: u64,
    pub sends: u64,
    pub failures: u64,
    pub retries: u64,
    pub succeeded: u64,
    pub connection_dead: u64,
    pub aborted: u64,
    pub exhausted: u64,
    pub rejected: u64,
}

impl MetricsSnapshot {
    /// Attempts that reached any terminal state
    pub fn terminated(&self) -> u64 {
        self.succeeded + self.connection_dead + self.aborted + self.exhausted + self.rejected
    }

    pub fn in_flight(&self) -> u64 {
        self.attempts.saturating_sub(self.terminated())
    }

    /// Counters in the shape the summary aggregator takes
    pub fn outcome_counts(&self) -> OutcomeCounts {
        OutcomeCounts {
            attempts: self.attempts,
            sends: self.sends,
            failures: self.failures,
            retries: self.retries,
            succeeded: self.succeeded,
            connection_dead: self.connection_dead,
            aborted: self.aborted,
            exhausted: self.exhausted,
            rejected: self.rejected,
        }
    }
}
