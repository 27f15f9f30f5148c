//! DeliveryAttempt - one retryable notification to one connection
//!
//! An attempt is moved by value from the send site into the transport
//! callback, and from there into the retry timer, so at most one
//! continuation owns it at any time.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use contracts::{NotificationRequest, SubscriberConnection};
use retry_timer::{RetryDecision, RetryPolicy};

/// Why a pending retry was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The item moved past the notified version
    VersionAdvanced { current: u64 },
    /// The item no longer exists
    ItemNotFound,
    /// The oracle could not answer
    VersionUnknown,
}

/// Lifecycle of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Created,
    AwaitingResponse,
    AwaitingRetry { delay: Duration },
    // ===== Terminal =====
    Succeeded,
    ConnectionDead,
    Aborted(AbortReason),
    Exhausted,
    SchedulerRejected,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            AttemptState::Created
                | AttemptState::AwaitingResponse
                | AttemptState::AwaitingRetry { .. }
        )
    }

    /// Metric/log label
    pub fn label(&self) -> &'static str {
        match self {
            AttemptState::Created => "created",
            AttemptState::AwaitingResponse => "awaiting_response",
            AttemptState::AwaitingRetry { .. } => "awaiting_retry",
            AttemptState::Succeeded => "succeeded",
            AttemptState::ConnectionDead => "connection_dead",
            AttemptState::Aborted(_) => "aborted",
            AttemptState::Exhausted => "exhausted",
            AttemptState::SchedulerRejected => "rejected",
        }
    }
}

/// Notification of one change to one connection
pub struct DeliveryAttempt {
    connection: Arc<dyn SubscriberConnection>,
    request: Arc<NotificationRequest>,
    retry_count: u32,
    state: AttemptState,
}

impl fmt::Debug for DeliveryAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryAttempt")
            .field("remote", &self.connection.remote_identity())
            .field("request", &self.request)
            .field("retry_count", &self.retry_count)
            .field("state", &self.state)
            .finish()
    }
}

impl DeliveryAttempt {
    pub fn new(connection: Arc<dyn SubscriberConnection>, request: Arc<NotificationRequest>) -> Self {
        Self {
            connection,
            request,
            retry_count: 0,
            state: AttemptState::Created,
        }
    }

    pub fn connection(&self) -> &Arc<dyn SubscriberConnection> {
        &self.connection
    }

    pub fn remote(&self) -> &str {
        self.connection.remote_identity()
    }

    pub fn request(&self) -> &Arc<NotificationRequest> {
        &self.request
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// A send is about to be issued
    pub fn mark_sending(&mut self) {
        debug_assert!(!self.state.is_terminal(), "send on terminal attempt");
        self.state = AttemptState::AwaitingResponse;
    }

    /// Count a failed send and ask the policy what comes next
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> RetryDecision {
        self.retry_count += 1;
        let decision = policy.decide(self.retry_count);
        self.state = match decision {
            RetryDecision::RetryAfter(delay) => AttemptState::AwaitingRetry { delay },
            RetryDecision::GiveUp => AttemptState::Exhausted,
        };
        decision
    }

    /// Move to a terminal state
    pub fn terminate(&mut self, state: AttemptState) {
        debug_assert!(state.is_terminal(), "{state:?} is not terminal");
        self.state = state;
    }

    /// Capture what is needed to rebuild this attempt if a send is refused
    /// synchronously (the refused callback is dropped unrun)
    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            connection: Arc::clone(&self.connection),
            request: Arc::clone(&self.request),
            retry_count: self.retry_count,
        }
    }
}

/// Ownership token for an attempt whose send was refused
pub(crate) struct Checkpoint {
    connection: Arc<dyn SubscriberConnection>,
    request: Arc<NotificationRequest>,
    retry_count: u32,
}

impl Checkpoint {
    pub(crate) fn restore(self) -> DeliveryAttempt {
        DeliveryAttempt {
            connection: self.connection,
            request: self.request,
            retry_count: self.retry_count,
            state: AttemptState::AwaitingResponse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters::InMemoryConnection;
    use retry_timer::LinearBackoff;

    fn attempt() -> DeliveryAttempt {
        DeliveryAttempt::new(
            InMemoryConnection::new("peer"),
            Arc::new(NotificationRequest {
                item_id: "x".into(),
                partition: "dc1".into(),
                version: 5,
            }),
        )
    }

    #[test]
    fn test_failures_walk_schedule_then_exhaust() {
        let policy = RetryPolicy::new(2, LinearBackoff::new(100, 50));
        let mut attempt = attempt();
        assert_eq!(attempt.state(), AttemptState::Created);

        attempt.mark_sending();
        assert_eq!(
            attempt.record_failure(&policy),
            RetryDecision::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(
            attempt.state(),
            AttemptState::AwaitingRetry {
                delay: Duration::from_millis(100)
            }
        );

        attempt.mark_sending();
        attempt.record_failure(&policy);
        attempt.mark_sending();
        assert_eq!(attempt.record_failure(&policy), RetryDecision::GiveUp);
        assert_eq!(attempt.state(), AttemptState::Exhausted);
        assert!(attempt.state().is_terminal());
        assert_eq!(attempt.retry_count(), 3);
    }

    #[test]
    fn test_checkpoint_restores_retry_count() {
        let policy = RetryPolicy::new(5, LinearBackoff::new(1, 0));
        let mut attempt = attempt();
        attempt.mark_sending();
        attempt.record_failure(&policy);

        let restored = attempt.checkpoint().restore();
        assert_eq!(restored.retry_count(), 1);
        assert_eq!(restored.remote(), "peer");
        assert_eq!(restored.state(), AttemptState::AwaitingResponse);
    }

    #[test]
    fn test_terminal_labels() {
        assert_eq!(AttemptState::Exhausted.label(), "exhausted");
        assert!(!AttemptState::AwaitingRetry {
            delay: Duration::ZERO
        }
        .is_terminal());
        assert!(AttemptState::Aborted(AbortReason::ItemNotFound).is_terminal());
    }
}
