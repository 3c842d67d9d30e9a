//! Configuration models for explorations.

pub mod explore;

pub use explore::{EnqueueConfig, ExploreConfig, DEFAULT_IDLE_TIMEOUT_MS};
