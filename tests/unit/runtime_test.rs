//! Tests for runtime adapters

use prometheus_interleave::runtime::{Enqueue, Immediate, Spawn, TokioSpawner, YieldNow};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(Box::pin(async move {
        tx.send(123).unwrap();
    }));

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[tokio::test]
async fn test_enqueue_strategies_complete() {
    YieldNow.defer().await;
    Immediate.defer().await;
}
