//! Adapter for the built-in test runner.
//!
//! Each helper runs an exploration on a private current-thread runtime, so
//! it is called from a plain `#[test]` function.

use crate::config::ExploreConfig;
use crate::core::error::{AppResult, RunFailure};
use crate::core::explorer::{iterate, Explorer, Summary};
use crate::core::run::RunContext;

/// Explore every interleaving with the default configuration and panic with
/// the failure report of the first failing run.
pub fn check<F>(test_case: F) -> Summary
where
    F: Fn(RunContext) -> AppResult<()> + Send + Sync + 'static,
{
    check_with(&ExploreConfig::default(), test_case)
}

/// Like [`check`], with explicit configuration. A failed interleaving is
/// retried up to [`ExploreConfig::retries`] times before it counts.
pub fn check_with<F>(config: &ExploreConfig, test_case: F) -> Summary
where
    F: Fn(RunContext) -> AppResult<()> + Send + Sync + 'static,
{
    let (explorer, mut failures) = explore(config, test_case, true);
    match failures.pop() {
        None => explorer.summary(),
        Some(failure) => panic!("{failure}"),
    }
}

/// Result of [`check_all`]: every run, failed or not.
#[derive(Debug)]
pub struct Report {
    /// Runs executed, not counting retries.
    pub runs: usize,
    /// One entry per failed run, in run order.
    pub failures: Vec<RunFailure>,
}

impl Report {
    /// Whether every run passed.
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Explore every interleaving, continuing past run-level failures, and
/// collect them instead of panicking. Retries follow [`check_with`].
pub fn check_all<F>(config: &ExploreConfig, test_case: F) -> Report
where
    F: Fn(RunContext) -> AppResult<()> + Send + Sync + 'static,
{
    let (explorer, failures) = explore(config, test_case, false);
    Report {
        runs: explorer.runs(),
        failures,
    }
}

fn explore<F>(config: &ExploreConfig, test_case: F, first_only: bool) -> (Explorer, Vec<RunFailure>)
where
    F: Fn(RunContext) -> AppResult<()> + Send + Sync + 'static,
{
    let mut failures = Vec::new();
    let mut explorer = match iterate(test_case, config) {
        Ok(explorer) => explorer,
        Err(error) => panic!("cannot start exploration: {error}"),
    };
    runtime().block_on(async {
        while !explorer.is_exhausted() {
            let failure = match config.retries {
                0 => explorer.next().await.err(),
                retries => attempt(&mut explorer, retries).await,
            };
            if let Some(failure) = failure {
                let fatal = failure.error.is_fatal();
                failures.push(failure);
                if fatal || first_only {
                    break;
                }
            }
        }
    });
    (explorer, failures)
}

/// Run the next interleaving, re-running it from a copy taken beforehand
/// while it fails at run level.
async fn attempt(explorer: &mut Explorer, retries: u32) -> Option<RunFailure> {
    let checkpoint = explorer.copy();
    let mut failure = explorer.next().await.err()?;
    for retry in 1..=retries {
        if failure.error.is_fatal() {
            break;
        }
        tracing::info!(run = %failure.meta.name, retry, error = %failure.error, "retrying run");
        let mut copy = checkpoint.copy();
        let outcome = copy.next().await;
        *explorer = copy;
        failure = outcome.err()?;
    }
    Some(failure)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| panic!("failed to build test runtime: {e}"))
}
