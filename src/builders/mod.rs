//! Builders to construct a wired runtime from configuration.

pub mod runtime_builder;

pub use runtime_builder::{build_runtime, Runtime};
