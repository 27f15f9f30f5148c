//! Scheduler error types

use thiserror::Error;

/// Retry scheduler errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// Too many timers waiting to be placed on the wheel
    #[error("timer '{timer}' queue full ({capacity} pending), task rejected")]
    QueueFull { timer: String, capacity: usize },

    /// Task panicked while executing
    #[error("timer '{timer}' task failed: {message}")]
    TaskPanicked { timer: String, message: String },

    /// Timer has been stopped
    #[error("timer '{timer}' is stopped")]
    Shutdown { timer: String },

    /// Created outside a tokio runtime
    #[error("timer '{timer}' requires a tokio runtime")]
    NoRuntime { timer: String },
}

impl SchedulerError {
    pub fn shutdown(timer: impl Into<String>) -> Self {
        Self::Shutdown {
            timer: timer.into(),
        }
    }

    pub(crate) fn panicked(timer: &str, payload: &(dyn std::any::Any + Send)) -> Self {
        Self::TaskPanicked {
            timer: timer.to_string(),
            message: crate::panic_message(payload),
        }
    }
}
