//! Simulated subscriber fleet
//!
//! Each peer answers after a fixed latency and fails according to its
//! behavior plan; accepted notifications are remembered per item.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use contracts::{AsyncTransport, NotificationRequest, NotifyResponse, TransportError};
use tracing::debug;

/// Failure plan of one simulated subscriber
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberBehavior {
    /// Response latency
    pub latency: Duration,
    /// The first N calls get a non-success response
    pub fail_first: u32,
    /// Every N-th call fails with a remote error (0 = never)
    pub fail_every: u32,
}

#[derive(Debug, Default)]
struct PeerState {
    behavior: SubscriberBehavior,
    calls: AtomicU32,
    accepted: AtomicU64,
    delivered: Mutex<HashMap<(String, String), u64>>,
}

/// Async transport backed by in-process subscribers
#[derive(Debug, Default)]
pub struct SimulatedSubscribers {
    peers: RwLock<HashMap<String, Arc<PeerState>>>,
}

impl SimulatedSubscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a subscriber
    pub fn add(&self, peer: impl Into<String>, behavior: SubscriberBehavior) {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                peer.into(),
                Arc::new(PeerState {
                    behavior,
                    ..PeerState::default()
                }),
            );
    }

    /// Remove a subscriber; later calls to it fail with `PeerNotFound`
    pub fn remove(&self, peer: &str) -> bool {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer)
            .is_some()
    }

    fn peer(&self, peer: &str) -> Option<Arc<PeerState>> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer)
            .cloned()
    }

    /// Calls received by `peer`, accepted or not
    pub fn calls(&self, peer: &str) -> u32 {
        self.peer(peer)
            .map(|p| p.calls.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Notifications `peer` accepted
    pub fn accepted(&self, peer: &str) -> u64 {
        self.peer(peer)
            .map(|p| p.accepted.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Highest version of an item `peer` has accepted
    pub fn delivered_version(&self, peer: &str, partition: &str, item_id: &str) -> Option<u64> {
        let state = self.peer(peer)?;
        let delivered = state
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        delivered
            .get(&(partition.to_string(), item_id.to_string()))
            .copied()
    }
}

impl AsyncTransport for SimulatedSubscribers {
    async fn call(
        &self,
        peer: &str,
        request: &NotificationRequest,
    ) -> Result<NotifyResponse, TransportError> {
        let state = self
            .peer(peer)
            .ok_or_else(|| TransportError::peer_not_found(peer))?;

        if !state.behavior.latency.is_zero() {
            tokio::time::sleep(state.behavior.latency).await;
        }

        let n = state.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if n <= state.behavior.fail_first {
            debug!(peer, call = n, "Simulated subscriber not ready");
            return Ok(NotifyResponse::failed("subscriber warming up"));
        }
        if state.behavior.fail_every > 0 && n % state.behavior.fail_every == 0 {
            return Err(TransportError::remote(peer, "simulated fault"));
        }

        let mut delivered = state
            .delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = delivered
            .entry((request.partition.clone(), request.item_id.clone()))
            .or_insert(0);
        *slot = (*slot).max(request.version);
        state.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(NotifyResponse::ok())
    }
}
