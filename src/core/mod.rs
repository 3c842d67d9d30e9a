//! Exploration engine: action model, frontier, decision tree, run driver
//! and explorer.

pub mod action;
pub mod error;
pub mod explorer;
pub mod pool;
pub mod ready;
pub mod run;
pub mod tree;

pub use action::{ActionKey, ActionKind, SequenceId, Stage};
pub use error::{AppResult, ExploreError, RunFailure};
pub use explorer::{iterate, run, Explorer, Summary};
pub use pool::SnapshotEntry;
pub use ready::{Promise, Ready};
pub use run::{RunContext, RunMeta, Sequence};
pub use tree::{DecisionTree, Node, NodeId, Path};
