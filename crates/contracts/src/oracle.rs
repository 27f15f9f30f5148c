//! VersionOracle trait - authoritative version lookup

use crate::ContractError;

/// Read-only view of the current version of every data item
pub trait VersionOracle: Send + Sync {
    /// Current version of `item_id` in `partition`
    ///
    /// # Errors
    /// Returns [`ContractError::ItemNotFound`] if the item is unknown.
    fn current_version(&self, partition: &str, item_id: &str) -> Result<u64, ContractError>;
}
