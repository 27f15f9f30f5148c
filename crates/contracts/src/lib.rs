//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: the
//! change/notification data model, the boundary traits of the external
//! collaborators, and the configuration blueprint.
//! Business crates depend only on this crate, never on each other's internals.
//!
//! ## Version Model
//! - Versions are `u64`, monotonically increasing per item within a partition
//! - A notification is stale once the item's current version differs from it

mod change;
mod config;
mod connection;
mod error;
mod oracle;
mod transport;

pub use change::*;
pub use config::*;
pub use connection::{ConnectionDirectory, SubscriberConnection};
pub use error::*;
pub use oracle::VersionOracle;
pub use transport::*;
