//! Iteration over the interleavings of a test case.

use std::sync::Arc;

use serde::Serialize;
use tracing::{Instrument, Span};
use uuid::Uuid;

use crate::builders::ExplorerBuilder;
use crate::config::ExploreConfig;
use crate::core::action::ActionKey;
use crate::core::error::{AppResult, ExploreError, RunFailure};
use crate::core::run::{RunContext, RunDriver, RunMeta, RunSettings, TestCase};
use crate::core::tree::{DecisionTree, Path};
use crate::util::run_name;

/// Outcome of a complete exploration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Runs executed, one per distinct interleaving.
    pub runs: usize,
    /// Decision points recorded in the tree.
    pub decision_points: usize,
}

/// Stateful iterator over the interleavings of one test case.
///
/// Each [`next`](Self::next) executes one run. A run-level failure is
/// reported and the explorer moves past it, so iteration may continue;
/// failures that invalidate the exploration itself end it.
#[derive(Clone)]
pub struct Explorer {
    id: Uuid,
    span: Span,
    test_case: TestCase,
    settings: RunSettings,
    tree: DecisionTree,
    path: Path,
    runs: usize,
    exhausted: bool,
    last: Option<RunMeta>,
}

impl Explorer {
    pub(crate) fn from_parts(test_case: TestCase, settings: RunSettings) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            span: exploration_span(id),
            test_case,
            settings,
            tree: DecisionTree::default(),
            path: Path::default(),
            runs: 0,
            exhausted: false,
            last: None,
        }
    }

    /// Execute the next interleaving.
    ///
    /// Returns `Ok(true)` if more interleavings remain, `Ok(false)` once the
    /// exploration is exhausted. Calling it after exhaustion does nothing.
    pub async fn next(&mut self) -> Result<bool, RunFailure> {
        if self.exhausted {
            return Ok(false);
        }
        self.runs += 1;
        let ordinal = self.runs;

        if let Some(max) = self.settings.max_runs.filter(|max| ordinal > *max) {
            self.exhausted = true;
            let meta = RunMeta::unstarted(ordinal, &self.path);
            tracing::warn!(exploration = %self.id, max, "max runs exceeded");
            self.last = Some(meta.clone());
            return Err(RunFailure::new(ExploreError::MaxRunsExceeded(max), meta));
        }

        let span = tracing::info_span!(parent: &self.span, "run", run = %run_name(ordinal));
        let driver = RunDriver::new(&mut self.tree, std::mem::take(&mut self.path), ordinal, &self.settings);
        let (path, meta, outcome) = driver.drive(&self.test_case).instrument(span).await;
        self.path = path;
        self.last = Some(meta.clone());

        match outcome {
            Ok(()) => {
                tracing::debug!(exploration = %self.id, run = %meta.name, steps = meta.trace.len(), "run complete");
                self.step_forward().map_err(|e| RunFailure::new(e, meta))
            }
            Err(error) if error.is_fatal() => {
                self.exhausted = true;
                tracing::error!(exploration = %self.id, run = %meta.name, %error, "exploration aborted");
                Err(RunFailure::new(error, meta))
            }
            Err(error) => {
                tracing::warn!(exploration = %self.id, run = %meta.name, %error, "run failed");
                if let Err(e) = self.step_forward() {
                    return Err(RunFailure::new(e, meta));
                }
                Err(RunFailure::new(error, meta))
            }
        }
    }

    /// Move the path to the next interleaving.
    fn step_forward(&mut self) -> Result<bool, ExploreError> {
        match self.tree.backtrack(&mut self.path) {
            Ok(more) => {
                self.exhausted = !more;
                if !more {
                    tracing::info!(exploration = %self.id, runs = self.runs, "exploration exhausted");
                }
                Ok(more)
            }
            Err(error) => {
                self.exhausted = true;
                tracing::error!(exploration = %self.id, %error, "backtracking failed");
                Err(error)
            }
        }
    }

    /// Execute every remaining interleaving, stopping at the first failure.
    pub async fn run_to_end(&mut self) -> Result<Summary, RunFailure> {
        while self.next().await? {}
        Ok(self.summary())
    }

    /// Independent copy with the same progress, for retrying a run.
    #[must_use]
    pub fn copy(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy.span = exploration_span(copy.id);
        copy
    }

    /// Name of the most recent run, empty before the first.
    pub fn name(&self) -> String {
        self.last.as_ref().map(|meta| meta.name.clone()).unwrap_or_default()
    }

    /// Keys consumed by the most recent run.
    pub fn trace(&self) -> &[ActionKey] {
        self.last.as_ref().map(|meta| meta.trace.as_slice()).unwrap_or_default()
    }

    /// Keys the most recent run did not reach.
    pub fn todo(&self) -> &[ActionKey] {
        self.last.as_ref().map(|meta| meta.todo.as_slice()).unwrap_or_default()
    }

    /// Diagnostics of the most recent run.
    pub const fn last_run(&self) -> Option<&RunMeta> {
        self.last.as_ref()
    }

    /// Runs started so far.
    pub const fn runs(&self) -> usize {
        self.runs
    }

    /// Whether every interleaving has been tried.
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Path the next run will replay.
    pub const fn path(&self) -> &Path {
        &self.path
    }

    /// Decision points recorded so far.
    pub const fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    /// Identifier of this exploration in logs.
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Span every run of this exploration is recorded under.
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// Counts so far.
    pub fn summary(&self) -> Summary {
        Summary {
            runs: self.runs,
            decision_points: self.tree.len(),
        }
    }
}

impl std::fmt::Debug for Explorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Explorer")
            .field("id", &self.id)
            .field("runs", &self.runs)
            .field("exhausted", &self.exhausted)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Explore every interleaving of `test_case`, stopping at the first failure.
pub async fn run<F>(test_case: F, config: &ExploreConfig) -> Result<Summary, RunFailure>
where
    F: Fn(RunContext) -> AppResult<()> + Send + Sync + 'static,
{
    let mut explorer = iterate(test_case, config)
        .map_err(|e| RunFailure::new(e, RunMeta::unstarted(0, &Path::default())))?;
    let summary = explorer.run_to_end().await?;
    tracing::info!(exploration = %explorer.id(), runs = summary.runs, "all interleavings passed");
    Ok(summary)
}

/// Explorer producing one interleaving of `test_case` per `next()`.
pub fn iterate<F>(test_case: F, config: &ExploreConfig) -> Result<Explorer, ExploreError>
where
    F: Fn(RunContext) -> AppResult<()> + Send + Sync + 'static,
{
    ExplorerBuilder::new(test_case).config(config.clone()).build()
}

fn exploration_span(id: Uuid) -> Span {
    tracing::info_span!("exploration", id = %id)
}

pub(crate) fn erase<F>(test_case: F) -> TestCase
where
    F: Fn(RunContext) -> AppResult<()> + Send + Sync + 'static,
{
    Arc::new(test_case)
}
