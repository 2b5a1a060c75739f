//! Error types for the scheduling and resource-lifecycle components.

use thiserror::Error;

/// Errors produced by the task scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The bounded task queue is at capacity.
    #[error("task queue is full")]
    QueueFull,
    /// The scheduler has been shut down; no further dispatch is possible.
    #[error("scheduler has been shut down")]
    Shutdown,
    /// A task body panicked; carries the first panic message since the last wait.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
    /// A global scheduler has already been installed for this process.
    #[error("global scheduler already installed")]
    AlreadyInstalled,
    /// No global scheduler has been installed yet.
    #[error("global scheduler not installed")]
    NotInstalled,
}

/// Errors produced by the generational resource pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool's slot limit is exhausted and no recycled slot is available.
    #[error("pool slot limit {limit} exhausted")]
    OutOfMemory {
        /// The configured slot limit that was hit.
        limit: usize,
    },
}

/// Errors produced by the asset lease manager.
#[derive(Debug, Error)]
pub enum AssetError {
    /// The asset is unknown, stale, still loading, failed, or gated behind
    /// processing — in every case there is no loaded value to hand out.
    #[error("asset not loaded")]
    NotLoaded,
    /// The requested type does not match the type recorded at load time.
    #[error("asset type mismatch: requested {requested}, stored {stored}")]
    TypeMismatch {
        /// Type the caller asked for.
        requested: &'static str,
        /// Type the record actually holds.
        stored: &'static str,
    },
    /// The record pool could not allocate a slot.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// Dispatching the loader onto the task scheduler failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Errors produced by the frame graph scheduler.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The declared read/write sets form a dependency cycle; names the
    /// passes that could not be ordered. Reported before any pass executes.
    #[error("cyclic pass dependencies involving: {0:?}")]
    Cycle(Vec<String>),
    /// Dispatching a pass onto the task scheduler failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Result type for asset loader closures, using anyhow for application-facing
/// failure contexts.
pub type LoaderResult<T> = Result<T, anyhow::Error>;
