//! ManualScheduler - deterministic fake clock
//!
//! Nothing fires until the owner advances the clock. Every requested delay is
//! recorded, so tests can assert the exact retry schedule.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::scheduler::run_guarded;
use crate::{LogFailureHandler, RetryScheduler, RetryTask, SchedulerError, TaskFailureHandler};

const NAME: &str = "manual";

#[derive(Default)]
struct ManualState {
    now: Duration,
    seq: u64,
    queue: BTreeMap<(Duration, u64), RetryTask>,
    requested: Vec<Duration>,
    reject_next: usize,
    stopped: bool,
}

/// Scheduler driven by explicit `advance` calls
pub struct ManualScheduler {
    state: Mutex<ManualState>,
    handler: Arc<dyn TaskFailureHandler>,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    /// Create with a logging failure handler
    pub fn new() -> Self {
        Self::with_handler(Arc::new(LogFailureHandler))
    }

    /// Create with a custom failure handler
    pub fn with_handler(handler: Arc<dyn TaskFailureHandler>) -> Self {
        Self {
            state: Mutex::new(ManualState::default()),
            handler,
        }
    }

    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current fake time since creation
    pub fn now(&self) -> Duration {
        self.state().now
    }

    /// Timers waiting to fire
    pub fn pending(&self) -> usize {
        self.state().queue.len()
    }

    /// Every delay passed to `after`, in call order (rejected ones included)
    pub fn requested_delays(&self) -> Vec<Duration> {
        self.state().requested.clone()
    }

    /// Reject the next `n` calls to `after` as if the queue were full
    pub fn reject_next(&self, n: usize) {
        self.state().reject_next = n;
    }

    /// Stop accepting and firing timers; returns the number dropped
    pub fn stop(&self) -> usize {
        let mut state = self.state();
        state.stopped = true;
        let dropped = state.queue.len();
        state.queue.clear();
        dropped
    }

    /// Move the clock forward by `by`, firing every task due on the way
    ///
    /// Tasks run in deadline order with the lock released, so they may
    /// schedule further timers; those fire too if due within the window.
    /// Returns the number of tasks fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut fired = 0;

        loop {
            let task = {
                let mut state = self.state();
                let due = state
                    .queue
                    .first_key_value()
                    .map(|(key, _)| *key)
                    .filter(|(deadline, _)| *deadline <= target);
                match due {
                    Some(key) => {
                        state.now = key.0;
                        state.queue.remove(&key)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            match task {
                Some(task) => {
                    run_guarded(NAME, task, self.handler.as_ref());
                    fired += 1;
                }
                None => return fired,
            }
        }
    }

    /// Jump to the earliest pending deadline and fire what is due there
    ///
    /// Returns `None` if nothing is pending.
    pub fn advance_to_next(&self) -> Option<usize> {
        let next = {
            let state = self.state();
            let (deadline, _) = *state.queue.first_key_value()?.0;
            deadline.saturating_sub(state.now)
        };
        Some(self.advance(next))
    }

    /// Keep firing until no timer is pending, at most `max_steps` jumps
    pub fn run_until_idle(&self, max_steps: usize) -> usize {
        let mut fired = 0;
        for _ in 0..max_steps {
            match self.advance_to_next() {
                Some(n) => fired += n,
                None => break,
            }
        }
        fired
    }
}

impl RetryScheduler for ManualScheduler {
    fn after(&self, delay: Duration, task: RetryTask) -> Result<(), SchedulerError> {
        {
            let mut state = self.state();
            if state.stopped {
                return Err(SchedulerError::shutdown(NAME));
            }
            state.requested.push(delay);
            if state.reject_next == 0 {
                let deadline = state.now + delay;
                let seq = state.seq;
                state.seq += 1;
                state.queue.insert((deadline, seq), task);
                return Ok(());
            }
            state.reject_next -= 1;
        }

        // Handler runs with the lock released
        let err = SchedulerError::QueueFull {
            timer: NAME.to_string(),
            capacity: 0,
        };
        self.handler.execution_rejected(&err);
        Err(err)
    }
}
