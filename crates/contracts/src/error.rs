//! Layered error definitions
//!
//! Categorized by source: config / registry / transport

use std::time::Duration;

use thiserror::Error;

/// Unified contract error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Registry Errors =====
    /// The version oracle has no entry for the item
    #[error("data item '{item_id}' not found in partition '{partition}'")]
    ItemNotFound { partition: String, item_id: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create item-not-found error
    pub fn item_not_found(partition: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self::ItemNotFound {
            partition: partition.into(),
            item_id: item_id.into(),
        }
    }
}

/// Transport-level failure of a single send
///
/// Every variant drives the retry path of a delivery attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Peer has no route/channel in the transport
    #[error("no channel to peer '{peer}'")]
    PeerNotFound { peer: String },

    /// No response within the response timeout
    #[error("request to '{peer}' timed out after {}ms", timeout.as_millis())]
    Timeout { peer: String, timeout: Duration },

    /// Remote side raised an error while handling the request
    #[error("remote error from '{peer}': {message}")]
    Remote { peer: String, message: String },

    /// Transport has been shut down
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Create peer-not-found error
    pub fn peer_not_found(peer: impl Into<String>) -> Self {
        Self::PeerNotFound { peer: peer.into() }
    }

    /// Create remote error
    pub fn remote(peer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            peer: peer.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_not_found_message() {
        let err = ContractError::item_not_found("dc1", "svc.a");
        assert_eq!(
            err.to_string(),
            "data item 'svc.a' not found in partition 'dc1'"
        );
    }

    #[test]
    fn test_timeout_message_in_millis() {
        let err = TransportError::Timeout {
            peer: "10.0.0.1:9600".into(),
            timeout: Duration::from_millis(3000),
        };
        assert!(err.to_string().contains("3000ms"), "got: {err}");
    }
}
