//! Tests for builder modules

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use prometheus_interleave::builders::ExplorerBuilder;
use prometheus_interleave::config::{EnqueueConfig, ExploreConfig};
use prometheus_interleave::core::{AppResult, ExploreError, RunContext};
use prometheus_interleave::runtime::Enqueue;

fn two_actions(ctx: RunContext) -> AppResult<()> {
    let left = Arc::new(AtomicUsize::new(2));
    for label in ["A", "B"] {
        let (left, done) = (Arc::clone(&left), ctx.clone());
        ctx.later_as(label, move || {
            if left.fetch_sub(1, Ordering::SeqCst) == 1 {
                done.done();
            }
            Ok(())
        });
    }
    Ok(())
}

#[test]
fn test_builder_defaults() {
    let builder = ExplorerBuilder::new(two_actions);
    assert_eq!(builder.settings(), &ExploreConfig::default());
    let explorer = builder.build().expect("default config is valid");
    assert_eq!(explorer.runs(), 0);
    assert!(!explorer.is_exhausted());
    assert!(explorer.tree().is_empty());
}

#[test]
fn test_builder_rejects_invalid_config() {
    let err = ExplorerBuilder::new(two_actions).max_runs(0).build().unwrap_err();
    assert!(matches!(err, ExploreError::InvalidConfig(_)));
}

#[test]
fn test_builder_applies_config() {
    let builder = ExplorerBuilder::new(two_actions)
        .config(ExploreConfig::default().with_enqueue(EnqueueConfig::Immediate))
        .max_runs(7);
    assert_eq!(builder.settings().max_runs, Some(7));
    assert_eq!(builder.settings().enqueue, EnqueueConfig::Immediate);
}

#[derive(Default)]
struct Counting(AtomicUsize);

#[async_trait]
impl Enqueue for Counting {
    async fn defer(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_custom_enqueue_runs_between_steps() {
    let counting = Arc::new(Counting::default());
    let mut explorer = ExplorerBuilder::new(two_actions)
        .enqueue(Arc::clone(&counting) as Arc<dyn Enqueue>)
        .build()
        .unwrap();
    let summary = explorer.run_to_end().await.unwrap();
    // A,B and B,A with two steps each.
    assert_eq!(summary.runs, 2);
    assert_eq!(counting.0.load(Ordering::SeqCst), 4);
}

#[test]
fn test_each_exploration_opens_its_own_span() {
    let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
    tracing::subscriber::with_default(subscriber, || {
        let explorer = ExplorerBuilder::new(two_actions).build().unwrap();
        let metadata = explorer.span().metadata().expect("span is enabled");
        assert_eq!(metadata.name(), "exploration");
        assert!(metadata.fields().field("id").is_some());

        let copy = explorer.copy();
        assert!(copy.span().id().is_some());
        assert_ne!(copy.span().id(), explorer.span().id());
    });
}
