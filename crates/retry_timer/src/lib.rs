//! # Retry Timer
//!
//! Delayed one-shot execution for delivery retries.
//!
//! Provides:
//! - `RetryScheduler` seam with an explicit failure-reporting channel
//! - `HashedWheelTimer`: tick-bucketed wheel, O(1) insertion, tokio driven
//! - `ManualScheduler`: deterministic fake clock for tests and simulations
//! - `RetryPolicy` / `LinearBackoff`: retry budget and delay schedule
//!
//! ## Example
//!
//! ```ignore
//! use retry_timer::{HashedWheelTimer, LogFailureHandler, RetryScheduler};
//!
//! let timer = HashedWheelTimer::new("notify-retry", &config.timer, Arc::new(LogFailureHandler))?;
//! timer.after(Duration::from_millis(150), Box::new(|| println!("fired")))?;
//! ```

mod backoff;
mod error;
mod manual;
mod scheduler;
mod wheel;

pub use backoff::{LinearBackoff, RetryDecision, RetryPolicy};
pub use error::SchedulerError;
pub use manual::ManualScheduler;
pub use scheduler::{
    panic_message, LogFailureHandler, RetryScheduler, RetryTask, TaskFailureHandler,
};
pub use wheel::HashedWheelTimer;
