//! In-memory connection directory

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use contracts::{ConnectionDirectory, SubscriberConnection};
use tracing::debug;

/// Connection whose liveness can be flipped at runtime
#[derive(Debug)]
pub struct InMemoryConnection {
    remote: String,
    live: AtomicBool,
}

impl InMemoryConnection {
    /// Create a live connection
    pub fn new(remote: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            remote: remote.into(),
            live: AtomicBool::new(true),
        })
    }

    /// Mark the link as broken
    pub fn close(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl SubscriberConnection for InMemoryConnection {
    fn remote_identity(&self) -> &str {
        &self.remote
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

/// Directory of subscriber connections keyed by remote identity
#[derive(Debug, Default)]
pub struct InMemoryConnectionDirectory {
    connections: RwLock<Vec<Arc<InMemoryConnection>>>,
}

impl InMemoryConnectionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new live connection, replacing any previous one to `remote`
    pub fn connect(&self, remote: impl Into<String>) -> Arc<InMemoryConnection> {
        let connection = InMemoryConnection::new(remote);
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        connections.retain(|c| {
            let same = c.remote == connection.remote;
            if same {
                c.close();
            }
            !same
        });
        connections.push(Arc::clone(&connection));
        debug!(remote = %connection.remote, "Subscriber connected");
        connection
    }

    /// Close and forget the connection to `remote`; returns whether it existed
    pub fn disconnect(&self, remote: &str) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = connections.len();
        connections.retain(|c| {
            let same = c.remote == remote;
            if same {
                c.close();
            }
            !same
        });
        let removed = connections.len() != before;
        if removed {
            debug!(remote, "Subscriber disconnected");
        }
        removed
    }

    /// Number of registered connections, live or not
    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConnectionDirectory for InMemoryConnectionDirectory {
    fn live_connections(&self) -> Vec<Arc<dyn SubscriberConnection>> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| c.is_live())
            .map(|c| Arc::clone(c) as Arc<dyn SubscriberConnection>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_snapshot_excludes_closed() {
        let directory = InMemoryConnectionDirectory::new();
        directory.connect("10.0.0.1:9600");
        let second = directory.connect("10.0.0.2:9600");
        second.close();

        let live = directory.live_connections();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].remote_identity(), "10.0.0.1:9600");
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_reconnect_replaces_and_closes_old() {
        let directory = InMemoryConnectionDirectory::new();
        let old = directory.connect("peer");
        let new = directory.connect("peer");

        assert!(!old.is_live());
        assert!(new.is_live());
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_disconnect() {
        let directory = InMemoryConnectionDirectory::new();
        let conn = directory.connect("peer");
        assert!(directory.disconnect("peer"));
        assert!(!conn.is_live());
        assert!(!directory.disconnect("peer"));
        assert!(directory.is_empty());
    }
}
