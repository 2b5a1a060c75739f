//! Configuration models for the scheduler and runtime.

pub mod runtime;

pub use runtime::{RuntimeConfig, SchedulerConfig};
