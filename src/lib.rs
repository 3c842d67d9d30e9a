//! # Prometheus Interleave
//!
//! An exhaustive-interleaving test scheduler for concurrent code.
//!
//! A test case declares logically concurrent actions. Some return at once,
//! others only finish when a completion signal fires. The scheduler re-runs
//! the test case once per legal interleaving of those actions, so ordering
//! bugs such as races and premature completion surface deterministically
//! instead of depending on one arbitrary run.
//!
//! ## Model
//!
//! - **Sequence**: an ordered chain of actions. An action may only be chosen
//!   once every earlier action of its sequence has been invoked.
//! - **Duration action**: receives a [`Ready`](core::Ready) and finishes when
//!   it is resolved; the continuation it hands over is scheduled like any
//!   other step.
//! - **Run**: one execution of the test case, ended by
//!   [`RunContext::done`](core::RunContext::done).
//!
//! Each run replays a recorded path prefix and then discovers new decisions,
//! choosing the smallest eligible key. Depth-first backtracking over the
//! decision tree picks the next untried interleaving.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use prometheus_interleave::config::ExploreConfig;
//! use prometheus_interleave::core::run;
//!
//! # async fn demo() {
//! let summary = run(
//!     |ctx| {
//!         let log = Arc::new(Mutex::new(Vec::new()));
//!         let (a, b) = (Arc::clone(&log), Arc::clone(&log));
//!         ctx.later_as("A", move || { a.lock().push("A"); Ok(()) });
//!         ctx.later_as("B", move || { b.lock().push("B"); Ok(()) })
//!             .later_as("C", {
//!                 let ctx = ctx.clone();
//!                 move || { ctx.done(); Ok(()) }
//!             });
//!         Ok(())
//!     },
//!     &ExploreConfig::default(),
//! )
//! .await;
//! # let _ = summary;
//! # }
//! ```
//!
//! Calling `done()` from `C` is premature in the interleaving `B, C, A`, and
//! that run is reported with the keys it consumed and the ones it did not
//! reach.
//!
//! ## Front ends
//!
//! - [`core::run`] explores everything and stops at the first failure.
//! - [`core::iterate`] returns an [`Explorer`](core::Explorer) that executes
//!   one interleaving per `next()` and can be copied to retry a run.
//! - [`harness`] wraps both for plain `#[test]` functions.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Exploration engine: actions, frontier, decision tree, runs and explorer.
pub mod core;
/// Configuration models for explorations.
pub mod config;
/// Builders to construct explorers from configuration.
pub mod builders;
/// Adapter for the built-in test runner.
pub mod harness;
/// Runtime adapters for stepping and spawning.
pub mod runtime;
/// Shared utilities.
pub mod util;
