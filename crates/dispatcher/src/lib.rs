//! # Dispatcher
//!
//! Change-notification fan-out.
//!
//! Responsible for:
//! - Routing each `DataItemChange` to the notifiers interested in its kind
//! - Fanning a change out to every live subscriber connection
//! - Retrying failed deliveries with linear backoff
//! - Dropping retries whose version has gone stale

pub mod attempt;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod registry;

pub use attempt::{AbortReason, AttemptState, DeliveryAttempt};
pub use contracts::{DataItemChange, SourceKind};
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, NotifierMetrics};
pub use notifier::{DispatcherSettings, NotificationDispatcher, NotifierDeps};
pub use registry::{DataChangeNotifier, NotifierRegistry};
