//! RetryScheduler trait and failure reporting

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tracing::error;

use crate::SchedulerError;

/// Action executed once when its timer expires
pub type RetryTask = Box<dyn FnOnce() + Send + 'static>;

/// Executes an action once after a delay
///
/// Scheduling never blocks the caller. Implementations report rejections
/// to their [`TaskFailureHandler`] and stay usable afterwards.
pub trait RetryScheduler: Send + Sync {
    /// Run `task` once, no earlier than `delay` from now
    ///
    /// # Errors
    /// Returns an error if the task was rejected; it will never run.
    fn after(&self, delay: Duration, task: RetryTask) -> Result<(), SchedulerError>;
}

/// Error sink for scheduler-level failures
pub trait TaskFailureHandler: Send + Sync {
    /// A task could not be accepted or started
    fn execution_rejected(&self, error: &SchedulerError);

    /// A task started but panicked
    fn execution_failed(&self, error: &SchedulerError);
}

/// Failure handler that reports through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFailureHandler;

impl TaskFailureHandler for LogFailureHandler {
    fn execution_rejected(&self, error: &SchedulerError) {
        error!(error = %error, "Timer execution rejected");
    }

    fn execution_failed(&self, error: &SchedulerError) {
        error!(error = %error, "Timer execution failed");
    }
}

/// Run a task, turning a panic into an `execution_failed` report
pub(crate) fn run_guarded(timer: &str, task: RetryTask, handler: &dyn TaskFailureHandler) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
        handler.execution_failed(&SchedulerError::panicked(timer, payload.as_ref()));
    }
}

/// Text of a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
