//! # Frameloom
//!
//! A frame-aware task scheduling and resource-lifecycle core for real-time
//! runtimes.
//!
//! This library provides the concurrency backbone that a frame-oriented
//! system (a renderer, a simulation loop, an interactive tool) needs to
//! share, mutate, recycle, and asynchronously repopulate memory-backed
//! resources across many worker threads and many logical frames — without
//! use-after-free, without unbounded staleness, and without serializing
//! unrelated work.
//!
//! ## Core Problem Solved
//!
//! Frame-oriented workloads have temporal correctness requirements that
//! ordinary job systems ignore:
//!
//! - **In-flight frames**: work submitted N frames ago may still read a
//!   resource through a handle captured before the resource was removed
//! - **Concurrent repopulation**: an asset reload must never mutate a value
//!   that a running pass is still reading
//! - **Data hazards between passes**: per-frame work units that read and
//!   write shared resource categories must be ordered, but only where a
//!   hazard actually exists
//!
//! ## Key Features
//!
//! - **Task Scheduler**: a fixed pool of dedicated OS worker threads
//!   consuming a bounded queue; non-blocking dispatch, drain-aware
//!   `wait_for_all`, graceful shutdown
//! - **Generational Resource Pool**: handle-based slot storage with deferred,
//!   frame-keyed recycling so no in-flight frame can observe a freed value
//! - **Asset Lease Manager**: named, asynchronously loaded, versioned assets;
//!   leases pin the value observed at pin time across reloads
//! - **Frame Graph Scheduler**: passes declare read/write access to resource
//!   categories and are executed in maximally parallel, hazard-free layers
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use frameloom::builders::build_runtime;
//! use frameloom::config::RuntimeConfig;
//! use frameloom::core::FrameGraph;
//!
//! let mut runtime = build_runtime(&RuntimeConfig::new())?;
//!
//! let handle = runtime.assets().load("terrain/heightmap", |name, _handle| {
//!     Ok(load_heightmap_from_disk(name)?)
//! })?;
//! runtime.scheduler().wait_for_all()?;
//!
//! let mut graph = FrameGraph::new();
//! graph.add_pass("simulate", |b| { b.write::<WorldState>(); }, move || { /* ... */ });
//! graph.add_pass("render", |b| { b.read::<WorldState>(); }, move || { /* ... */ });
//! graph.execute(runtime.scheduler())?;
//! ```
//!
//! For complete examples, see the integration tests under `tests/`.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core components: task scheduler, generational pool, asset leases, frame graph.
pub mod core;
/// Configuration models for the scheduler and runtime.
pub mod config;
/// Builders to construct a wired runtime from configuration.
pub mod builders;
/// Shared utilities: telemetry setup and the layer-barrier latch.
pub mod util;
