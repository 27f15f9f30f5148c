//! VersionTable - in-memory version oracle

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use contracts::{ContractError, VersionOracle};

/// Current version per (partition, item)
#[derive(Debug, Default)]
pub struct VersionTable {
    versions: RwLock<HashMap<(String, String), u64>>,
}

impl VersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the version of an item
    pub fn put(&self, partition: &str, item_id: &str, version: u64) {
        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((partition.to_string(), item_id.to_string()), version);
    }

    /// Advance an item by one version (starting at 1) and return the new one
    pub fn bump(&self, partition: &str, item_id: &str) -> u64 {
        let mut versions = self.versions.write().unwrap_or_else(PoisonError::into_inner);
        let version = versions
            .entry((partition.to_string(), item_id.to_string()))
            .or_insert(0);
        *version += 1;
        *version
    }

    /// Forget an item; returns its last version
    pub fn remove(&self, partition: &str, item_id: &str) -> Option<u64> {
        self.versions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(partition.to_string(), item_id.to_string()))
    }

    pub fn get(&self, partition: &str, item_id: &str) -> Option<u64> {
        self.versions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(partition.to_string(), item_id.to_string()))
            .copied()
    }
}

impl VersionOracle for VersionTable {
    fn current_version(&self, partition: &str, item_id: &str) -> Result<u64, ContractError> {
        self.get(partition, item_id)
            .ok_or_else(|| ContractError::item_not_found(partition, item_id))
    }
}
