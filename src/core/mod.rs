//! Core components: task scheduler, generational pool, asset leases, frame graph.

pub mod asset_manager;
pub mod error;
pub mod frame_graph;
pub mod resource_pool;
pub mod task_scheduler;

pub use asset_manager::{AssetHandle, AssetManager, AssetState, AssetsTag, Lease};
pub use error::{AssetError, GraphError, LoaderResult, PoolError, SchedulerError};
pub use frame_graph::{FrameGraph, FrameGraphReport, PassBuilder};
pub use resource_pool::{GenerationalPool, Handle};
pub use task_scheduler::{install_global, try_global, SchedulerStats, TaskScheduler};
