//! Change events and the notification payload derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a data item changed
///
/// Notifiers declare the set of kinds they want to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Direct publish by a client
    Publish,
    /// Cross-site synchronization
    Synchronize,
    /// Replica backup from a peer data node
    Backup,
    /// Snapshot restore
    Snapshot,
    /// Cleanup of expired registrations
    Clean,
    /// Temporary (non-persisted) publish
    PublishTemp,
}

impl SourceKind {
    /// All kinds, in declaration order
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Publish,
        SourceKind::Synchronize,
        SourceKind::Backup,
        SourceKind::Snapshot,
        SourceKind::Clean,
        SourceKind::PublishTemp,
    ];

    /// Stable lowercase label (matches the serde name)
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Publish => "publish",
            SourceKind::Synchronize => "synchronize",
            SourceKind::Backup => "backup",
            SourceKind::Snapshot => "snapshot",
            SourceKind::Clean => "clean",
            SourceKind::PublishTemp => "publish_temp",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registry entry whose version advanced
///
/// Produced by the storage engine; consumed by dispatch, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItemChange {
    /// Opaque stable identifier of the item
    pub item_id: String,

    /// Logical grouping (e.g. data center) the version is tracked in
    pub partition: String,

    /// New version of the item
    pub version: u64,

    /// Why the item changed
    pub source_kind: SourceKind,

    /// Version before this change, if known
    #[serde(default)]
    pub previous_version: Option<u64>,
}

impl DataItemChange {
    /// Create a change without previous-version information
    pub fn new(
        item_id: impl Into<String>,
        partition: impl Into<String>,
        version: u64,
        source_kind: SourceKind,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            partition: partition.into(),
            version,
            source_kind,
            previous_version: None,
        }
    }

    /// Attach the version this change supersedes
    pub fn with_previous_version(mut self, previous: u64) -> Self {
        self.previous_version = Some(previous);
        self
    }
}

/// Wire-level payload sent to every subscriber for one change
///
/// One instance is shared (behind `Arc`) by all attempts of the same change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub item_id: String,
    pub partition: String,
    pub version: u64,
}

impl NotificationRequest {
    /// Derive the payload from a change
    pub fn from_change(change: &DataItemChange) -> Self {
        Self {
            item_id: change.item_id.clone(),
            partition: change.partition.clone(),
            version: change.version,
        }
    }
}

impl fmt::Display for NotificationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DataChange{{item={}, partition={}, version={}}}",
            self.item_id, self.partition, self.version
        )
    }
}

/// Application-level answer of a subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyResponse {
    /// Whether the subscriber accepted the notification
    pub success: bool,

    /// Optional diagnostic from the subscriber
    #[serde(default)]
    pub message: Option<String>,
}

impl NotifyResponse {
    /// Successful response
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Failed response with a reason
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}
