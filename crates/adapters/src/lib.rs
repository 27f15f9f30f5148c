//! # Adapters
//!
//! In-memory implementations of the external collaborators the notifier
//! depends on.
//!
//! Provides:
//! - `InMemoryConnectionDirectory` with toggleable connection liveness
//! - `VersionTable`, a partition/item version map acting as the oracle
//! - `SpawningTransport`, bridging an `AsyncTransport` onto the callback
//!   `Transport` contract with a response timeout
//! - `ScriptedTransport`, a synchronous mock with per-peer scripted replies
//! - `SimulatedSubscribers`, an async subscriber fleet with latency and
//!   failure plans

mod bridge;
mod directory;
mod scripted;
mod simulated;
mod versions;

pub use bridge::SpawningTransport;
pub use directory::{InMemoryConnection, InMemoryConnectionDirectory};
pub use scripted::{RecordedCall, ScriptedReply, ScriptedTransport};
pub use simulated::{SimulatedSubscribers, SubscriberBehavior};
pub use versions::VersionTable;
