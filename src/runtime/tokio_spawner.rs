//! Spawning of bridged futures onto a tokio runtime.

use std::future::Future;
use std::pin::Pin;

use tokio::runtime::Handle;

/// Boxed future handed to a [`Spawn`] implementation.
pub type BoxTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Where futures bridged through [`Ready::when`](crate::core::Ready::when) run.
pub trait Spawn: Send + Sync {
    /// Start `task` in the background.
    fn spawn(&self, task: BoxTask);
}

/// Tokio-based spawner. Without an explicit handle it uses the runtime the
/// caller is on.
#[derive(Debug, Clone, Default)]
pub struct TokioSpawner {
    handle: Option<Handle>,
}

impl TokioSpawner {
    /// Spawn onto the runtime behind `handle`.
    pub const fn new(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Spawn onto whichever runtime is current at spawn time.
    pub const fn current() -> Self {
        Self { handle: None }
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, task: BoxTask) {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => match Handle::try_current() {
                Ok(handle) => handle,
                Err(e) => {
                    // Dropping the task drops its completion signal, which fails the run.
                    tracing::error!(error = %e, "no tokio runtime to spawn bridged future on");
                    return;
                }
            },
        };
        handle.spawn(task);
    }
}
