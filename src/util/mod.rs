//! Shared utilities.

pub mod naming;
pub mod telemetry;

pub use naming::run_name;
pub use telemetry::{init_tracing, DEFAULT_FILTER};
