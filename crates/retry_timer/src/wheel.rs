//! HashedWheelTimer - bucketed timer wheel driven by a tokio task
//!
//! Layout:
//! - `after` pushes into a bounded queue (never blocks, O(1))
//! - every tick the worker moves queued timers into their bucket and expires
//!   the bucket under the cursor
//! - entries live in a Slab; buckets only hold slab keys
//!
//! Timers further out than one revolution carry a `remaining_rounds` count
//! and are skipped until it reaches zero.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::TimerConfig;
use slab::Slab;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument};

use crate::scheduler::run_guarded;
use crate::{RetryScheduler, RetryTask, SchedulerError, TaskFailureHandler};

/// Upper bound of queued timers moved onto the wheel per tick
const MAX_TRANSFER_PER_TICK: usize = 100_000;

/// Clamp for delays that would overflow `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Timer accepted by `after`, not yet on the wheel
struct QueuedTimer {
    deadline: Instant,
    task: RetryTask,
}

/// Timer placed in a bucket
struct WheelEntry {
    deadline: Instant,
    remaining_rounds: u64,
    task: RetryTask,
}

/// Wheel state, owned exclusively by the worker task
struct Wheel {
    start: Instant,
    tick_nanos: u64,
    mask: u64,
    buckets: Vec<Vec<usize>>,
    entries: Slab<WheelEntry>,
    ticks: u64,
}

impl Wheel {
    fn new(start: Instant, tick: Duration, ticks_per_wheel: usize) -> Self {
        let len = ticks_per_wheel.max(1).next_power_of_two();
        let tick_nanos = u64::try_from(tick.as_nanos()).unwrap_or(u64::MAX).max(1);
        Self {
            start,
            tick_nanos,
            mask: (len - 1) as u64,
            buckets: (0..len).map(|_| Vec::new()).collect(),
            entries: Slab::new(),
            ticks: 0,
        }
    }

    fn len(&self) -> u64 {
        self.mask + 1
    }

    /// Deadline of the tick currently under the cursor
    fn current_tick_deadline(&self) -> Instant {
        let nanos = self.tick_nanos.saturating_mul(self.ticks + 1);
        self.start + Duration::from_nanos(nanos)
    }

    fn place(&mut self, timer: QueuedTimer) {
        let elapsed = timer.deadline.saturating_duration_since(self.start);
        let elapsed_nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let calculated = elapsed_nanos / self.tick_nanos;
        let remaining_rounds = calculated.saturating_sub(self.ticks) / self.len();
        // Already-overdue timers go into the current bucket
        let slot = (calculated.max(self.ticks) & self.mask) as usize;

        let key = self.entries.insert(WheelEntry {
            deadline: timer.deadline,
            remaining_rounds,
            task: timer.task,
        });
        self.buckets[slot].push(key);
    }

    /// Remove and return every task in the current bucket due by `now`
    fn expire(&mut self, now: Instant) -> Vec<RetryTask> {
        let slot = (self.ticks & self.mask) as usize;
        let keys = std::mem::take(&mut self.buckets[slot]);
        let mut kept = Vec::new();
        let mut due = Vec::new();

        for key in keys {
            let entry = &mut self.entries[key];
            if entry.remaining_rounds == 0 && entry.deadline <= now {
                due.push(self.entries.remove(key).task);
            } else {
                entry.remaining_rounds = entry.remaining_rounds.saturating_sub(1);
                kept.push(key);
            }
        }

        self.buckets[slot] = kept;
        due
    }
}

/// Runs expired tasks on tokio tasks, bounded by a semaphore
///
/// Every expired task is spawned at once and waits for a permit inside its
/// own task, so a burst above the limit queues instead of being dropped.
#[derive(Clone)]
struct TaskExecutor {
    name: Arc<str>,
    permits: Arc<Semaphore>,
    handler: Arc<dyn TaskFailureHandler>,
}

impl TaskExecutor {
    fn execute(&self, task: RetryTask) {
        let name = Arc::clone(&self.name);
        let permits = Arc::clone(&self.permits);
        let handler = Arc::clone(&self.handler);
        tokio::spawn(async move {
            // Closed only by `stop`; waiting tasks are then dropped
            match permits.acquire_owned().await {
                Ok(_permit) => run_guarded(&name, task, handler.as_ref()),
                Err(_) => handler.execution_rejected(&SchedulerError::shutdown(name.as_ref())),
            }
        });
    }
}

/// Hashed wheel timer
///
/// Must be created inside a tokio runtime. Dropping the timer stops it.
pub struct HashedWheelTimer {
    name: Arc<str>,
    tx: mpsc::Sender<QueuedTimer>,
    capacity: usize,
    pending: Arc<AtomicUsize>,
    stopped: AtomicBool,
    handler: Arc<dyn TaskFailureHandler>,
    permits: Arc<Semaphore>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for HashedWheelTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedWheelTimer")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl HashedWheelTimer {
    /// Create the timer and spawn its worker
    ///
    /// # Errors
    /// Returns [`SchedulerError::NoRuntime`] outside a tokio runtime.
    #[instrument(name = "wheel_timer_new", skip(config, handler), fields(tick_ms = config.tick_ms))]
    pub fn new(
        name: &str,
        config: &TimerConfig,
        handler: Arc<dyn TaskFailureHandler>,
    ) -> Result<Self, SchedulerError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime {
            timer: name.to_string(),
        })?;

        let name: Arc<str> = Arc::from(name);
        let capacity = config.max_pending.max(1);
        let limit = config.worker_concurrency.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let pending = Arc::new(AtomicUsize::new(0));

        let wheel = Wheel::new(Instant::now(), config.tick(), config.ticks_per_wheel);
        let permits = Arc::new(Semaphore::new(limit));
        let executor = TaskExecutor {
            name: Arc::clone(&name),
            permits: Arc::clone(&permits),
            handler: Arc::clone(&handler),
        };

        let worker = runtime.spawn(wheel_worker(wheel, rx, executor, Arc::clone(&pending)));

        info!(
            timer = %name,
            ticks_per_wheel = config.ticks_per_wheel.max(1).next_power_of_two(),
            max_pending = capacity,
            worker_concurrency = limit,
            "Wheel timer started"
        );

        Ok(Self {
            name,
            tx,
            capacity,
            pending,
            stopped: AtomicBool::new(false),
            handler,
            permits,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Timer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timers accepted and not yet executed
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop the worker; pending timers and expired tasks still waiting for
    /// an execution slot are dropped without running
    ///
    /// Returns the number of timers dropped.
    pub fn stop(&self) -> usize {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.abort();
        }
        self.permits.close();
        let dropped = self.pending.swap(0, Ordering::AcqRel);
        info!(timer = %self.name, dropped, "Wheel timer stopped");
        dropped
    }
}

impl RetryScheduler for HashedWheelTimer {
    fn after(&self, delay: Duration, task: RetryTask) -> Result<(), SchedulerError> {
        if self.is_stopped() {
            return Err(SchedulerError::shutdown(self.name.as_ref()));
        }

        let now = Instant::now();
        let timer = QueuedTimer {
            deadline: now.checked_add(delay).unwrap_or(now + FAR_FUTURE),
            task,
        };
        // Count before sending so the worker can never decrement first
        self.pending.fetch_add(1, Ordering::AcqRel);

        match self.tx.try_send(timer) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                let err = SchedulerError::QueueFull {
                    timer: self.name.to_string(),
                    capacity: self.capacity,
                };
                self.handler.execution_rejected(&err);
                Err(err)
            }
            Err(TrySendError::Closed(_)) => {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                Err(SchedulerError::shutdown(self.name.as_ref()))
            }
        }
    }
}

impl Drop for HashedWheelTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker loop: sleep to the next tick, transfer, expire, advance
async fn wheel_worker(
    mut wheel: Wheel,
    mut rx: mpsc::Receiver<QueuedTimer>,
    executor: TaskExecutor,
    pending: Arc<AtomicUsize>,
) {
    debug!(timer = %executor.name, "Wheel worker started");

    loop {
        let tick_deadline = wheel.current_tick_deadline();
        sleep_until(tick_deadline).await;

        for _ in 0..MAX_TRANSFER_PER_TICK {
            match rx.try_recv() {
                Ok(timer) => wheel.place(timer),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!(timer = %executor.name, "Wheel queue closed, worker exiting");
                    return;
                }
            }
        }

        for task in wheel.expire(tick_deadline) {
            pending.fetch_sub(1, Ordering::AcqRel);
            executor.execute(task);
        }

        wheel.ticks += 1;
    }
}
