//! Task scheduler with a fixed pool of dedicated OS worker threads.
//!
//! The scheduler owns a bounded queue of independent, short-lived work units.
//! It knows nothing about ordering between tasks; callers sequence work via
//! [`TaskScheduler::wait_for_all`] or the frame graph's layer barrier.
//!
//! # Design
//!
//! - **No polling**: workers block on channel `recv`; the drain wait uses a
//!   Condvar over an in-flight counter
//! - **Clean shutdown**: dropping the sender unblocks idle workers after the
//!   queue drains
//! - **Panic isolation**: a panicking task body terminates only that task;
//!   the first panic message since the last wait is surfaced by
//!   [`TaskScheduler::wait_for_all`]

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::core::error::SchedulerError;

/// A unit of work accepted by the scheduler.
type Job = Box<dyn FnOnce() + Send + 'static>;

/// Statistics about scheduler utilization.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Tasks waiting in the queue.
    pub queued_tasks: u64,
    /// Currently executing tasks.
    pub active_tasks: u64,
    /// Total tasks accepted by `dispatch`.
    pub dispatched_tasks: u64,
    /// Total tasks completed without panicking.
    pub completed_tasks: u64,
    /// Total tasks whose body panicked.
    pub failed_tasks: u64,
}

/// Internal counters for scheduler statistics (thread-safe).
#[derive(Debug, Default)]
struct SchedulerCounters {
    queued_tasks: AtomicU64,
    active_tasks: AtomicU64,
    dispatched_tasks: AtomicU64,
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
}

impl SchedulerCounters {
    /// Get a snapshot of current statistics.
    fn snapshot(&self, worker_count: usize) -> SchedulerStats {
        SchedulerStats {
            worker_count,
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            dispatched_tasks: self.dispatched_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
        }
    }
}

/// In-flight accounting shared between dispatchers, workers, and waiters.
///
/// `pending` counts queued plus running tasks. A task dispatched from inside
/// another task increments the count before its parent's decrement, so the
/// drain wait covers nested dispatch.
struct InflightState {
    pending: Mutex<u64>,
    drained: Condvar,
    /// First panic message since the last drain wait.
    first_panic: Mutex<Option<String>>,
}

impl InflightState {
    fn new() -> Self {
        Self {
            pending: Mutex::new(0),
            drained: Condvar::new(),
            first_panic: Mutex::new(None),
        }
    }

    fn task_admitted(&self) {
        *self.pending.lock() += 1;
    }

    fn task_retired(&self) {
        let mut pending = self.pending.lock();
        *pending -= 1;
        if *pending == 0 {
            self.drained.notify_all();
        }
    }

    fn record_panic(&self, message: String) {
        let mut slot = self.first_panic.lock();
        if slot.is_none() {
            *slot = Some(message);
        }
    }
}

/// Fixed pool of dedicated OS worker threads consuming a bounded task queue.
///
/// Tasks are executed at-most-once, on some worker thread (never the
/// dispatching thread), in no guaranteed order relative to each other.
/// Concurrency-safety of task bodies is the caller's responsibility.
pub struct TaskScheduler {
    /// Task sender (to workers). Option allows clean shutdown by dropping.
    task_tx: Mutex<Option<Sender<Job>>>,
    /// In-flight accounting for `wait_for_all`.
    inflight: Arc<InflightState>,
    /// Statistics counters (lock-free atomics).
    counters: Arc<SchedulerCounters>,
    /// Shutdown flag.
    shutdown: AtomicBool,
    /// Worker thread handles.
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Number of worker threads spawned.
    worker_count: usize,
}

impl TaskScheduler {
    /// Create a scheduler with the given configuration, spawning
    /// `config.worker_count` worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if the configuration is
    /// invalid (zero workers or zero queue depth).
    pub fn new(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let (task_tx, task_rx) = bounded::<Job>(config.max_queue_depth);
        let inflight = Arc::new(InflightState::new());
        let counters = Arc::new(SchedulerCounters::default());

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            workers.push(spawn_worker(
                worker_id,
                task_rx.clone(),
                Arc::clone(&inflight),
                Arc::clone(&counters),
                config.thread_stack_size,
            ));
        }

        info!(
            worker_count = config.worker_count,
            max_queue_depth = config.max_queue_depth,
            "task scheduler initialized"
        );

        Ok(Self {
            task_tx: Mutex::new(Some(task_tx)),
            inflight,
            counters,
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(workers),
            worker_count: config.worker_count,
        })
    }

    /// Enqueue a unit of work and return immediately.
    ///
    /// The task will run on some worker thread; no ordering is guaranteed
    /// relative to other dispatched tasks. Tasks may themselves dispatch
    /// further tasks, but must not call [`TaskScheduler::wait_for_all`] from
    /// inside a task body (risk of deadlock).
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::QueueFull`] if the bounded queue is at capacity
    /// - [`SchedulerError::Shutdown`] if the scheduler has been shut down
    pub fn dispatch<F>(&self, job: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(SchedulerError::Shutdown);
        }

        let task_tx_guard = self.task_tx.lock();
        let Some(task_tx) = task_tx_guard.as_ref() else {
            return Err(SchedulerError::Shutdown);
        };

        // Admit before sending so a waiter can never observe a dispatched
        // task as absent from the pending count.
        self.inflight.task_admitted();

        match task_tx.try_send(Box::new(job)) {
            Ok(()) => {
                self.counters.dispatched_tasks.fetch_add(1, Ordering::Relaxed);
                self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(crossbeam_channel::TrySendError::Full(_)) => {
                self.inflight.task_retired();
                warn!("task queue is full");
                Err(SchedulerError::QueueFull)
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                self.inflight.task_retired();
                Err(SchedulerError::Shutdown)
            }
        }
    }

    /// Block the calling thread until every previously dispatched task,
    /// including tasks dispatched by other tasks, has completed.
    ///
    /// Must not be called from inside a task body.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::TaskPanicked`] carrying the first panic
    /// message observed since the last wait; panics after the first only
    /// increment the failure counter.
    pub fn wait_for_all(&self) -> Result<(), SchedulerError> {
        {
            let mut pending = self.inflight.pending.lock();
            while *pending > 0 {
                self.inflight.drained.wait(&mut pending);
            }
        }

        match self.inflight.first_panic.lock().take() {
            Some(message) => Err(SchedulerError::TaskPanicked(message)),
            None => Ok(()),
        }
    }

    /// Get current scheduler statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.counters.snapshot(self.worker_count)
    }

    /// Shut down the scheduler: the queue is drained, workers exit and are
    /// joined, and subsequent [`TaskScheduler::dispatch`] calls fail with
    /// [`SchedulerError::Shutdown`]. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("shutting down task scheduler");

        // Drop the sender so workers exit once the queue is drained.
        {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
        }

        let mut workers = self.workers.lock();
        let worker_count = workers.len();
        for (worker_id, worker) in workers.drain(..).enumerate() {
            if worker.join().is_err() {
                warn!(worker_id, "worker thread terminated abnormally");
            }
        }

        info!(worker_count, "task scheduler shut down");
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        // Signal shutdown but do not join workers in Drop; explicit
        // shutdown() is required for graceful cleanup.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
            debug!("scheduler dropped without explicit shutdown; workers detached");
        }
    }
}

/// Spawn a worker thread.
fn spawn_worker(
    worker_id: usize,
    task_rx: Receiver<Job>,
    inflight: Arc<InflightState>,
    counters: Arc<SchedulerCounters>,
    stack_size: usize,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("fl-worker-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id, "worker thread started");

            // Blocking recv; when the sender is dropped, recv returns Err
            // once the queue is drained and the worker exits.
            while let Ok(job) = task_rx.recv() {
                counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                counters.active_tasks.fetch_add(1, Ordering::Relaxed);

                let outcome = panic::catch_unwind(AssertUnwindSafe(job));

                counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
                match outcome {
                    Ok(()) => {
                        counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(payload) => {
                        counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                        let message = panic_message(payload.as_ref());
                        warn!(worker_id, message, "task body panicked");
                        inflight.record_panic(message.to_owned());
                    }
                }
                inflight.task_retired();
            }

            debug!(worker_id, "worker thread exiting");
        })
        .expect("Failed to spawn worker thread")
}

/// Extract a readable message from a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Process-wide scheduler handle, installed once by the top-level driver.
static GLOBAL_SCHEDULER: OnceLock<Arc<TaskScheduler>> = OnceLock::new();

/// Install `scheduler` as the process-wide scheduler.
///
/// The global scheduler is created once and torn down once (via
/// [`TaskScheduler::shutdown`]); it is never re-initialized.
///
/// # Errors
///
/// Returns [`SchedulerError::AlreadyInstalled`] if a global scheduler has
/// already been installed.
pub fn install_global(scheduler: Arc<TaskScheduler>) -> Result<(), SchedulerError> {
    GLOBAL_SCHEDULER
        .set(scheduler)
        .map_err(|_| SchedulerError::AlreadyInstalled)
}

/// Get the process-wide scheduler.
///
/// # Errors
///
/// Returns [`SchedulerError::NotInstalled`] if [`install_global`] has not
/// been called.
pub fn try_global() -> Result<Arc<TaskScheduler>, SchedulerError> {
    GLOBAL_SCHEDULER
        .get()
        .cloned()
        .ok_or(SchedulerError::NotInstalled)
}
