//! Shared utilities.

pub mod latch;
pub mod telemetry;

pub use latch::{CountdownLatch, LatchGuard};
pub use telemetry::init_tracing;
