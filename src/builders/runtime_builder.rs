//! Builder wiring a scheduler and asset manager from configuration.

use std::sync::Arc;

use tracing::info;

use crate::config::RuntimeConfig;
use crate::core::asset_manager::AssetManager;
use crate::core::error::SchedulerError;
use crate::core::task_scheduler::TaskScheduler;

/// A wired runtime: the task scheduler, an asset manager running on it, and
/// the frame clock that drivers feed to removal and recycling calls.
pub struct Runtime {
    scheduler: Arc<TaskScheduler>,
    assets: AssetManager,
    frame: u64,
}

impl Runtime {
    /// The task scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }

    /// The asset manager.
    #[must_use]
    pub const fn assets(&self) -> &AssetManager {
        &self.assets
    }

    /// The current frame index.
    #[must_use]
    pub const fn current_frame(&self) -> u64 {
        self.frame
    }

    /// Advance the frame clock and recycle asset records whose in-flight
    /// window has elapsed; returns the new frame index.
    pub fn begin_frame(&mut self) -> u64 {
        self.frame += 1;
        self.assets.process_unloads(self.frame);
        self.frame
    }

    /// Drain outstanding work, then stop the scheduler. After this call no
    /// further work can be dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::TaskPanicked`] if draining surfaced a task
    /// panic; the scheduler is shut down regardless.
    pub fn shutdown(&self) -> Result<(), SchedulerError> {
        let drained = self.scheduler.wait_for_all();
        self.scheduler.shutdown();
        drained
    }
}

/// Build a runtime from configuration: validate, spawn the scheduler, and
/// wire an asset manager to it.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidConfig`] if validation fails.
pub fn build_runtime(cfg: &RuntimeConfig) -> Result<Runtime, SchedulerError> {
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let scheduler = Arc::new(TaskScheduler::new(&cfg.scheduler)?);
    let mut assets = AssetManager::new(Arc::clone(&scheduler), cfg.frames_in_flight);
    if let Some(limit) = cfg.max_asset_slots {
        assets = assets.with_slot_limit(limit);
    }

    info!(
        worker_count = cfg.scheduler.worker_count,
        frames_in_flight = cfg.frames_in_flight,
        "runtime built"
    );

    Ok(Runtime {
        scheduler,
        assets,
        frame: 0,
    })
}
