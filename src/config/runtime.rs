//! Scheduler and runtime configuration structures.

use serde::{Deserialize, Serialize};

/// Default depth of the bounded task queue.
const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Default worker thread stack size (2 MiB).
const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Default number of frames that may still be in flight when a resource is
/// removed.
const DEFAULT_FRAMES_IN_FLIGHT: u64 = 2;

/// Task scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads; must be greater than 0.
    pub worker_count: usize,
    /// Maximum queued tasks before `dispatch` rejects with `QueueFull`.
    pub max_queue_depth: usize,
    /// Stack size for worker threads, in bytes.
    pub thread_stack_size: usize,
}

impl SchedulerConfig {
    /// Create a configuration with one worker per logical CPU and default
    /// queue depth and stack size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            worker_count: num_cpus::get(),
            max_queue_depth: DEFAULT_QUEUE_DEPTH,
            thread_stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the maximum queue depth.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, max_queue_depth: usize) -> Self {
        self.max_queue_depth = max_queue_depth;
        self
    }

    /// Set the worker thread stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.thread_stack_size == 0 {
            return Err("thread_stack_size must be greater than 0".into());
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Root configuration for a wired runtime: scheduler plus resource-lifecycle
/// parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Task scheduler configuration.
    pub scheduler: SchedulerConfig,
    /// Frames that must elapse before a removed resource may be recycled.
    pub frames_in_flight: u64,
    /// Optional cap on asset records; `None` means unbounded growth.
    pub max_asset_slots: Option<usize>,
}

impl RuntimeConfig {
    /// Create a configuration with scheduler defaults and two frames in
    /// flight.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scheduler: SchedulerConfig::new(),
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            max_asset_slots: None,
        }
    }

    /// Validate all nested configuration values.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending field.
    pub fn validate(&self) -> Result<(), String> {
        self.scheduler.validate()?;
        if self.frames_in_flight == 0 {
            return Err("frames_in_flight must be greater than 0".into());
        }
        if self.max_asset_slots == Some(0) {
            return Err("max_asset_slots must be greater than 0 when set".into());
        }
        Ok(())
    }

    /// Parse a runtime configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message for parse failures and validation failures alike.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
