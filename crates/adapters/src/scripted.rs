//! Scripted transport for unit tests
//!
//! Answers synchronously from a per-peer reply script and records every send.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::{
    NotificationRequest, NotifyResponse, ResponseCallback, SubscriberConnection, Transport,
    TransportError,
};

/// How the transport answers one send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Callback with a successful response
    Success,
    /// Callback with a non-success application response
    Reject(String),
    /// Callback with a transport error
    Error(TransportError),
    /// Synchronous resolution failure; callback is dropped
    Unresolvable,
}

/// One recorded send
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub peer: String,
    pub request: Arc<NotificationRequest>,
    pub timeout: Duration,
}

/// Synchronous mock transport
pub struct ScriptedTransport {
    /// Pending replies per peer, consumed front to back
    scripts: Mutex<HashMap<String, VecDeque<ScriptedReply>>>,
    /// Reply once a peer's script is exhausted
    fallback: ScriptedReply,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    /// Every send succeeds unless scripted otherwise
    pub fn new() -> Self {
        Self::with_fallback(ScriptedReply::Success)
    }

    pub fn with_fallback(fallback: ScriptedReply) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue replies for the next sends to `peer`
    pub fn script(&self, peer: &str, replies: impl IntoIterator<Item = ScriptedReply>) {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(peer.to_string())
            .or_default()
            .extend(replies);
    }

    /// All sends so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Sends directed at `peer`
    pub fn calls_to(&self, peer: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.peer == peer)
            .count()
    }

    fn next_reply(&self, peer: &str) -> ScriptedReply {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(peer)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Transport for ScriptedTransport {
    fn send_with_callback(
        &self,
        connection: &Arc<dyn SubscriberConnection>,
        request: Arc<NotificationRequest>,
        timeout: Duration,
        on_result: ResponseCallback,
    ) -> Result<(), TransportError> {
        let peer = connection.remote_identity().to_string();
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedCall {
            peer: peer.clone(),
            request,
            timeout,
        });

        // Locks are released before the callback runs; it may send again
        match self.next_reply(&peer) {
            ScriptedReply::Success => on_result(Ok(NotifyResponse::ok())),
            ScriptedReply::Reject(message) => on_result(Ok(NotifyResponse::failed(message))),
            ScriptedReply::Error(err) => on_result(Err(err)),
            ScriptedReply::Unresolvable => return Err(TransportError::peer_not_found(peer)),
        }
        Ok(())
    }
}
