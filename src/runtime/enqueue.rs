//! How the driver hands control back between two steps of a run.

use async_trait::async_trait;

/// Called by the run driver after every step, before the next decision.
///
/// Whatever the implementation awaits lets outside work (timers, bridged
/// futures) make progress between steps.
#[async_trait]
pub trait Enqueue: Send + Sync {
    /// Defer the next step.
    async fn defer(&self);
}

/// Yield to the tokio scheduler between steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct YieldNow;

#[async_trait]
impl Enqueue for YieldNow {
    async fn defer(&self) {
        tokio::task::yield_now().await;
    }
}

/// Run steps back to back. Outside work only progresses while the run is idle.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

#[async_trait]
impl Enqueue for Immediate {
    async fn defer(&self) {}
}
