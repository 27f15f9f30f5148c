//! Subscriber connection contracts
//!
//! Connections are owned by the directory; notifiers only borrow `Arc`
//! handles for the duration of a fan-out and its retries.

use std::fmt;
use std::sync::Arc;

/// A live link to a subscriber node
pub trait SubscriberConnection: Send + Sync + fmt::Debug {
    /// Stable identity of the remote end (typically `host:port`)
    fn remote_identity(&self) -> &str;

    /// Whether the link is still usable
    fn is_live(&self) -> bool;
}

/// Enumerates the subscriber connections currently held by this node
pub trait ConnectionDirectory: Send + Sync {
    /// Snapshot of live connections at call time
    ///
    /// The snapshot may be stale by the time a send happens; liveness is
    /// re-checked per send.
    fn live_connections(&self) -> Vec<Arc<dyn SubscriberConnection>>;
}
