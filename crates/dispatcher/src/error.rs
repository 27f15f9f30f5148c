//! Dispatcher error types
//!
//! Only construction can fail; delivery failures never leave an attempt.

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Notifier declared no source kinds
    #[error("notifier '{name}' handles no source kinds")]
    EmptyKinds { name: String },

    /// Two notifiers share a name
    #[error("notifier '{name}' registered twice")]
    DuplicateNotifier { name: String },
}
