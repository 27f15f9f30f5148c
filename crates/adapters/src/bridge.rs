//! SpawningTransport - async RPC client behind the callback contract

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    AsyncTransport, NotificationRequest, ResponseCallback, SubscriberConnection, Transport,
    TransportError,
};
use tokio::runtime::Handle;
use tracing::trace;

/// Runs each send as a tokio task bounded by the response timeout
///
/// The callback is invoked from that task, exactly once per accepted send.
pub struct SpawningTransport<T> {
    inner: Arc<T>,
    runtime: Handle,
    closed: AtomicBool,
}

impl<T> SpawningTransport<T>
where
    T: AsyncTransport + Send + Sync + 'static,
{
    pub fn new(inner: Arc<T>, runtime: Handle) -> Self {
        Self {
            inner,
            runtime,
            closed: AtomicBool::new(false),
        }
    }

    /// Refuse further sends; in-flight sends still complete
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn inner(&self) -> &Arc<T> {
        &self.inner
    }
}

impl<T> Transport for SpawningTransport<T>
where
    T: AsyncTransport + Send + Sync + 'static,
{
    fn send_with_callback(
        &self,
        connection: &Arc<dyn SubscriberConnection>,
        request: Arc<NotificationRequest>,
        timeout: Duration,
        on_result: ResponseCallback,
    ) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let inner = Arc::clone(&self.inner);
        let peer = connection.remote_identity().to_string();

        self.runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, inner.call(&peer, &request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout {
                    peer: peer.clone(),
                    timeout,
                }),
            };
            trace!(peer = %peer, ok = result.is_ok(), "Send completed");
            on_result(result);
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryConnection;
    use contracts::NotifyResponse;
    use tokio::sync::oneshot;

    struct SlowEcho {
        latency: Duration,
    }

    impl AsyncTransport for SlowEcho {
        async fn call(
            &self,
            _peer: &str,
            _request: &NotificationRequest,
        ) -> Result<NotifyResponse, TransportError> {
            tokio::time::sleep(self.latency).await;
            Ok(NotifyResponse::ok())
        }
    }

    fn request() -> Arc<NotificationRequest> {
        Arc::new(NotificationRequest {
            item_id: "x".into(),
            partition: "dc1".into(),
            version: 1,
        })
    }

    fn send(
        transport: &SpawningTransport<SlowEcho>,
        timeout: Duration,
    ) -> oneshot::Receiver<Result<NotifyResponse, TransportError>> {
        let connection: Arc<dyn SubscriberConnection> = InMemoryConnection::new("peer-1");
        let (tx, rx) = oneshot::channel();
        transport
            .send_with_callback(
                &connection,
                request(),
                timeout,
                Box::new(move |result| {
                    let _ = tx.send(result);
                }),
            )
            .unwrap();
        rx
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_within_timeout() {
        let transport = SpawningTransport::new(
            Arc::new(SlowEcho {
                latency: Duration::from_millis(10),
            }),
            Handle::current(),
        );
        let result = send(&transport, Duration::from_millis(100)).await.unwrap();
        assert_eq!(result, Ok(NotifyResponse::ok()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reported_through_callback() {
        let transport = SpawningTransport::new(
            Arc::new(SlowEcho {
                latency: Duration::from_secs(5),
            }),
            Handle::current(),
        );
        let result = send(&transport, Duration::from_millis(100)).await.unwrap();
        assert!(matches!(result, Err(TransportError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_closed_transport_refuses_synchronously() {
        let transport = SpawningTransport::new(
            Arc::new(SlowEcho {
                latency: Duration::ZERO,
            }),
            Handle::current(),
        );
        transport.close();

        let connection: Arc<dyn SubscriberConnection> = InMemoryConnection::new("peer-1");
        let result = transport.send_with_callback(
            &connection,
            request(),
            Duration::from_millis(10),
            Box::new(|_| panic!("callback must not run")),
        );
        assert_eq!(result, Err(TransportError::Closed));
    }
}
