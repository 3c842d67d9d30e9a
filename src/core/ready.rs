//! Completion protocol for duration actions.
//!
//! A duration action receives a [`Ready`] when it is invoked. Resolving it
//! hands the engine a continuation; the engine decides when that continuation
//! runs relative to everything else in the pool. `Ready` is consumed by every
//! resolving method, so an action instance can only be resolved once.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::core::error::{AppResult, ExploreError};
use crate::core::pool::EntryId;
use crate::core::run::{RunShared, Sequence};
use crate::runtime::Spawn;

/// Completion signal of one duration action instance.
///
/// Dropping it without resolving fails the run with
/// [`ExploreError::CompletionDropped`].
pub struct Ready {
    run: Weak<RunShared>,
    slot: EntryId,
    label: String,
    spawner: Arc<dyn Spawn>,
    resolved: bool,
}

impl Ready {
    pub(crate) fn new(
        run: Weak<RunShared>,
        slot: EntryId,
        label: String,
        spawner: Arc<dyn Spawn>,
    ) -> Self {
        Self {
            run,
            slot,
            label,
            spawner,
            resolved: false,
        }
    }

    /// Label of the action this signal belongs to.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Mark the action complete. `continuation` runs when the engine selects
    /// the action's resumption step.
    pub fn resolve<F>(mut self, continuation: F)
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.resolved = true;
        match self.run.upgrade() {
            Some(run) => run.resolve(self.slot, Box::new(continuation)),
            None => tracing::debug!(label = %self.label, "completion signal outlived its run"),
        }
    }

    /// Mark the action complete with nothing left to do.
    pub fn finish(self) {
        self.resolve(|| Ok(()));
    }

    /// Mark the action complete; its resumption step fails the run with `error`.
    pub fn fail(self, error: anyhow::Error) {
        self.resolve(move || Err(error));
    }

    /// Resolve once `future` settles.
    ///
    /// The returned [`Promise`] yields the future's outcome, success or error,
    /// when the engine selects the resumption step. An error nobody awaits
    /// fails the run instead.
    pub fn when<T, Fut>(self, future: Fut) -> Promise<T>
    where
        T: Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let label = self.label.clone();
        let spawner = Arc::clone(&self.spawner);
        spawner.spawn(Box::pin(async move {
            let outcome = future.await;
            self.resolve(move || deliver(tx, outcome));
        }));
        Promise::new(rx, label, None)
    }
}

impl Drop for Ready {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        if let Some(run) = self.run.upgrade() {
            run.fail(ExploreError::CompletionDropped(std::mem::take(&mut self.label)));
        }
    }
}

impl std::fmt::Debug for Ready {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ready")
            .field("label", &self.label)
            .field("slot", &self.slot)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

/// Hand an outcome to its awaiting [`Promise`]. An error with no receiver
/// left is returned so that it fails the run.
pub(crate) fn deliver<T>(tx: oneshot::Sender<AppResult<T>>, outcome: AppResult<T>) -> AppResult<()> {
    match tx.send(outcome) {
        Ok(()) | Err(Ok(_)) => Ok(()),
        Err(Err(error)) => Err(error),
    }
}

/// Awaitable outcome of a scheduled action or a bridged future.
///
/// Resolves to [`ExploreError::Abandoned`] if the run ends before the action
/// is executed.
#[must_use = "a promise does nothing unless awaited"]
pub struct Promise<T> {
    rx: oneshot::Receiver<AppResult<T>>,
    label: String,
    sequence: Option<Sequence>,
}

impl<T> Promise<T> {
    pub(crate) const fn new(
        rx: oneshot::Receiver<AppResult<T>>,
        label: String,
        sequence: Option<Sequence>,
    ) -> Self {
        Self {
            rx,
            label,
            sequence,
        }
    }

    /// Sequence the promised action was appended to, for further chaining.
    pub const fn sequence(&self) -> Option<&Sequence> {
        self.sequence.as_ref()
    }

    /// Label of the promised action.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T> Future for Promise<T> {
    type Output = AppResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Err(ExploreError::Abandoned(this.label.clone()).into()))
        })
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
