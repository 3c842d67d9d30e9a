//! Integration tests for the cooperative explorer: one run per `next()`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use prometheus_interleave::config::ExploreConfig;
use prometheus_interleave::core::{iterate, ActionKey, AppResult, ExploreError, RunContext};
use prometheus_interleave::harness;

/// A, plus B chained before C; C declares the test complete.
fn naive(ctx: RunContext) -> AppResult<()> {
    ctx.later_as("A", || Ok(()));
    let done = ctx.clone();
    ctx.later_as("B", || Ok(())).later_as("C", move || {
        done.done();
        Ok(())
    });
    Ok(())
}

/// Same shape, but done() is called by whichever action runs last.
fn minimal(ctx: RunContext) -> AppResult<()> {
    let left = Arc::new(AtomicUsize::new(3));
    let step = move |ctx: RunContext| {
        let left = Arc::clone(&left);
        move || -> AppResult<()> {
            if left.fetch_sub(1, Ordering::SeqCst) == 1 {
                ctx.done();
            }
            Ok(())
        }
    };
    ctx.later_as("A", step(ctx.clone()));
    ctx.later_as("B", step(ctx.clone()))
        .later_as("C", step(ctx.clone()));
    Ok(())
}

fn labels(keys: &[ActionKey]) -> Vec<String> {
    keys.iter().map(|k| k.label().to_string()).collect()
}

#[tokio::test]
async fn test_one_run_per_next() {
    let mut explorer = iterate(minimal, &ExploreConfig::default()).unwrap();
    assert_eq!(explorer.name(), "");

    let mut traces = Vec::new();
    loop {
        let more = explorer.next().await.expect("run passes");
        traces.push((explorer.name(), labels(explorer.trace())));
        assert!(explorer.todo().is_empty());
        if !more {
            break;
        }
    }

    assert_eq!(
        traces,
        [
            ("a".to_string(), vec!["A".to_string(), "B".into(), "C".into()]),
            ("b".to_string(), vec!["B".to_string(), "A".into(), "C".into()]),
            ("c".to_string(), vec!["B".to_string(), "C".into(), "A".into()]),
        ]
    );
    assert!(explorer.is_exhausted());
    assert!(!explorer.next().await.unwrap());
    assert_eq!(explorer.runs(), 3);
}

#[tokio::test]
async fn test_iteration_continues_after_failed_run() {
    let mut explorer = iterate(naive, &ExploreConfig::default()).unwrap();
    assert!(explorer.next().await.unwrap());
    assert!(explorer.next().await.unwrap());

    let failure = explorer.next().await.unwrap_err();
    assert!(matches!(failure.error, ExploreError::PrematureCompletion { .. }));
    assert_eq!(explorer.name(), "c");
    assert_eq!(labels(explorer.trace()), ["B", "C"]);
    // Nothing is left after the failing interleaving.
    assert!(explorer.is_exhausted());
}

#[tokio::test]
async fn test_every_faulty_run_is_reported() {
    let mut explorer = iterate(
        |ctx: RunContext| {
            ctx.later_as("A", || Ok(()));
            ctx.later_as("B", || Ok(()))
                .later_as("C", || Err(anyhow::anyhow!("C is broken")));
            Ok(())
        },
        &ExploreConfig::default(),
    )
    .unwrap();

    let mut failures = Vec::new();
    while !explorer.is_exhausted() {
        if let Err(failure) = explorer.next().await {
            failures.push(failure.meta.name.clone());
        }
    }
    assert_eq!(failures, ["a", "b", "c"]);
}

#[tokio::test]
async fn test_copy_retries_the_same_run() {
    let mut explorer = iterate(minimal, &ExploreConfig::default()).unwrap();
    explorer.next().await.unwrap();

    let mut retry = explorer.copy();
    assert_ne!(retry.id(), explorer.id());
    assert_eq!(retry.path(), explorer.path());

    explorer.next().await.unwrap();
    retry.next().await.unwrap();
    assert_eq!(retry.name(), explorer.name());
    assert_eq!(retry.trace(), explorer.trace());

    // The copy carries on independently.
    while retry.next().await.unwrap() {}
    assert_eq!(retry.runs(), 3);
    assert_eq!(explorer.runs(), 2);
}

#[tokio::test]
async fn test_fatal_error_ends_iteration() {
    let mut explorer = iterate(minimal, &ExploreConfig::default().with_max_runs(1)).unwrap();
    assert!(explorer.next().await.unwrap());
    let failure = explorer.next().await.unwrap_err();
    assert!(failure.error.is_fatal());
    assert_eq!(failure.meta.name, "b");
    assert_eq!(labels(&failure.meta.todo), ["B"]);
    assert!(!explorer.next().await.unwrap());
}

#[test]
fn test_harness_check_passes() {
    let summary = harness::check(minimal);
    assert_eq!(summary.runs, 3);
    assert!(summary.decision_points >= 3);
}

#[test]
#[should_panic(expected = "run [c] failed")]
fn test_harness_check_panics_with_report() {
    harness::check(naive);
}

#[test]
fn test_harness_check_all_collects_failures() {
    let report = harness::check_all(&ExploreConfig::default(), naive);
    assert_eq!(report.runs, 3);
    assert_eq!(report.failures.len(), 1);
    assert!(!report.passed());
    assert!(report.failures[0].to_string().contains("  after #1:B > C"));
}

fn count_down(left: &AtomicUsize, ctx: &RunContext) {
    if left.fetch_sub(1, Ordering::SeqCst) == 1 {
        ctx.done();
    }
}

/// A and B in either order; A fails the first time it is ever invoked.
fn flaky(calls: Arc<AtomicUsize>) -> impl Fn(RunContext) -> AppResult<()> + Send + Sync + 'static {
    move |ctx: RunContext| {
        let left = Arc::new(AtomicUsize::new(2));
        let (calls, left_a, ctx_a) = (Arc::clone(&calls), Arc::clone(&left), ctx.clone());
        ctx.later_as("A", move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("flaky");
            }
            count_down(&left_a, &ctx_a);
            Ok(())
        });
        let ctx_b = ctx.clone();
        ctx.later_as("B", move || {
            count_down(&left, &ctx_b);
            Ok(())
        });
        Ok(())
    }
}

#[test]
fn test_harness_retries_flaky_run_from_copy() {
    let config = ExploreConfig::default().with_retries(1);
    let report = harness::check_all(&config, flaky(Arc::default()));
    assert!(report.passed(), "{:?}", report.failures);
    assert_eq!(report.runs, 2);

    let summary = harness::check_with(&config, flaky(Arc::default()));
    assert_eq!(summary.runs, 2);
}

#[test]
fn test_harness_without_retries_reports_flaky_run() {
    let report = harness::check_all(&ExploreConfig::default(), flaky(Arc::default()));
    assert_eq!(report.runs, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].meta.name, "a");
    assert_eq!(labels(&report.failures[0].meta.trace), ["A"]);
}
