//! Builders to construct explorers from configuration.

pub mod explorer_builder;

pub use explorer_builder::ExplorerBuilder;
