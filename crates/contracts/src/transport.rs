//! Transport traits - notifier output interface
//!
//! [`Transport`] is the callback contract the notifier drives.
//! [`AsyncTransport`] is the request/response shape most RPC clients expose;
//! adapters bridge it onto the callback contract.

use std::sync::Arc;
use std::time::Duration;

use crate::{NotificationRequest, NotifyResponse, SubscriberConnection, TransportError};

/// Continuation invoked with the outcome of one send
pub type ResponseCallback =
    Box<dyn FnOnce(Result<NotifyResponse, TransportError>) + Send + 'static>;

/// Send-with-callback RPC to a subscriber
pub trait Transport: Send + Sync {
    /// Send `request` to the peer behind `connection`
    ///
    /// On `Ok(())`, `on_result` is invoked exactly once, with the response or
    /// a transport error (a missed `timeout` is reported as
    /// [`TransportError::Timeout`]). It may run on another thread.
    ///
    /// # Errors
    /// Returns an error when the peer cannot be resolved or the send cannot
    /// be issued; `on_result` is then dropped without being invoked.
    fn send_with_callback(
        &self,
        connection: &Arc<dyn SubscriberConnection>,
        request: Arc<NotificationRequest>,
        timeout: Duration,
        on_result: ResponseCallback,
    ) -> Result<(), TransportError>;
}

/// Request/response RPC client
#[trait_variant::make(AsyncTransport: Send)]
pub trait LocalAsyncTransport {
    /// Deliver `request` to `peer` and wait for its answer
    async fn call(
        &self,
        peer: &str,
        request: &NotificationRequest,
    ) -> Result<NotifyResponse, TransportError>;
}
