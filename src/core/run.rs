//! A single run: the handles a test case schedules through and the driver
//! that executes one interleaving.
//!
//! The run state sits behind one lock shared by the driver, every
//! [`RunContext`]/[`Sequence`] handle and every outstanding [`Ready`]. The
//! lock is never held while user code executes.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{oneshot, Notify};

use crate::core::action::{default_label, ActionKey, SequenceId, Stage, Step, Work};
use crate::core::error::{AppResult, ExploreError};
use crate::core::pool::{Choice, EntryId, Pool, PoolEntry, SnapshotEntry};
use crate::core::ready::{deliver, Promise, Ready};
use crate::core::tree::{DecisionTree, Node, NodeId, Path};
use crate::runtime::{Enqueue, Spawn};
use crate::util::run_name;

/// User test case: builds the sequences of one run.
pub(crate) type TestCase = Arc<dyn Fn(RunContext) -> AppResult<()> + Send + Sync + 'static>;

/// Diagnostics of a run: its ordinal, name and how far along the path it got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunMeta {
    /// 1-based run number within the exploration.
    pub ordinal: usize,
    /// Short alphabetic name derived from the ordinal.
    pub name: String,
    /// Keys consumed by the run.
    pub trace: Vec<ActionKey>,
    /// Keys on the path that the run did not reach.
    pub todo: Vec<ActionKey>,
}

impl RunMeta {
    fn new(ordinal: usize, path: &Path, depth: usize) -> Self {
        Self {
            ordinal,
            name: run_name(ordinal),
            trace: path.trace(depth),
            todo: path.todo(depth),
        }
    }

    /// Meta of a run that never started.
    pub(crate) fn unstarted(ordinal: usize, path: &Path) -> Self {
        Self::new(ordinal, path, 0)
    }
}

/// Per-run knobs shared by every run of an exploration.
#[derive(Clone)]
pub(crate) struct RunSettings {
    pub max_runs: Option<usize>,
    pub idle_timeout: Option<Duration>,
    pub enqueue: Arc<dyn Enqueue>,
    pub spawner: Arc<dyn Spawn>,
}

struct RunState {
    pool: Pool,
    sequences: Vec<Vec<String>>,
    path: Path,
    depth: usize,
    /// Placeholders the current decision point recorded as running.
    held: Vec<ActionKey>,
    done: bool,
    closed: bool,
    failure: Option<ExploreError>,
}

pub(crate) struct RunShared {
    state: Mutex<RunState>,
    wake: Notify,
    ordinal: usize,
}

impl RunShared {
    fn new(ordinal: usize, path: Path) -> Self {
        Self {
            state: Mutex::new(RunState {
                pool: Pool::default(),
                sequences: Vec::new(),
                path,
                depth: 0,
                held: Vec::new(),
                done: false,
                closed: false,
                failure: None,
            }),
            wake: Notify::new(),
            ordinal,
        }
    }

    fn open_sequence(&self) -> SequenceId {
        let mut state = self.state.lock();
        let id = SequenceId(u32::try_from(state.sequences.len()).unwrap_or(u32::MAX));
        state.sequences.push(Vec::new());
        id
    }

    fn schedule(&self, sequence: SequenceId, label: String, work: Work) {
        let mut state = self.state.lock();
        if state.closed {
            tracing::debug!(%sequence, %label, "action scheduled after run end ignored");
            return;
        }
        let state = &mut *state;
        let Some(labels) = state.sequences.get_mut(sequence.0 as usize) else {
            state
                .failure
                .get_or_insert_with(|| ExploreError::Internal(format!("unknown sequence {sequence}")));
            return;
        };
        labels.push(label);
        let key = ActionKey::new(sequence, labels.clone(), Stage::Invoke);
        tracing::trace!(key = %key, kind = ?work.kind(), "scheduled");
        state.pool.push(key, work);
        self.wake.notify_one();
    }

    pub(crate) fn resolve(&self, slot: EntryId, step: Step) {
        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            drop(step);
            return;
        }
        let rejected = state.pool.resolve(slot, step).err();
        drop(state);
        self.wake.notify_one();
        if rejected.is_some() {
            tracing::warn!(slot, "completion for an action that is not running");
        }
        // A rejected continuation may own another action's `Ready`, whose drop
        // locks the state again.
        drop(rejected);
    }

    pub(crate) fn fail(&self, error: ExploreError) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.failure.get_or_insert(error);
        self.wake.notify_one();
    }

    fn complete(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        if state.done {
            tracing::warn!("done() called more than once");
            return;
        }
        let pending =
            state.pool.selectable_except(&state.held) + state.path.len().saturating_sub(state.depth);
        if pending > 0 {
            state
                .failure
                .get_or_insert(ExploreError::PrematureCompletion { pending });
        } else {
            state.done = true;
        }
        self.wake.notify_one();
    }

    fn meta(&self) -> RunMeta {
        let state = self.state.lock();
        RunMeta::new(self.ordinal, &state.path, state.depth)
    }

    /// End the run: later scheduling and completions become no-ops.
    fn close(&self) -> (Path, RunMeta) {
        let mut state = self.state.lock();
        state.closed = true;
        let meta = RunMeta::new(self.ordinal, &state.path, state.depth);
        let path = std::mem::take(&mut state.path);
        let pool = std::mem::take(&mut state.pool);
        drop(state);
        tracing::debug!(leftover = pool.len(), depth = meta.trace.len(), "run closed");
        // Dropping leftover work may drop promise senders; keep that outside the lock.
        drop(pool);
        (path, meta)
    }
}

/// Handle passed to the test case for building sequences.
#[derive(Clone)]
pub struct RunContext {
    shared: Arc<RunShared>,
}

impl RunContext {
    /// Open an empty sequence.
    pub fn sequence(&self) -> Sequence {
        Sequence {
            id: self.shared.open_sequence(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Schedule an instantaneous action on a new sequence.
    pub fn later<F>(&self, action: F) -> Sequence
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.sequence().later(action)
    }

    /// Schedule a labelled instantaneous action on a new sequence.
    pub fn later_as<F>(&self, label: impl Into<String>, action: F) -> Sequence
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.sequence().later_as(label, action)
    }

    /// Schedule a duration action on a new sequence.
    pub fn later_ready<F>(&self, action: F) -> Sequence
    where
        F: FnOnce(Ready) -> AppResult<()> + Send + 'static,
    {
        self.sequence().later_ready(action)
    }

    /// Schedule a labelled duration action on a new sequence.
    pub fn later_ready_as<F>(&self, label: impl Into<String>, action: F) -> Sequence
    where
        F: FnOnce(Ready) -> AppResult<()> + Send + 'static,
    {
        self.sequence().later_ready_as(label, action)
    }

    /// Declare the run complete.
    ///
    /// Fails the run with [`ExploreError::PrematureCompletion`] if actions are
    /// still waiting to be chosen. When only running duration actions remain,
    /// the run ends once they have resumed.
    pub fn done(&self) {
        self.shared.complete();
    }

    /// Diagnostics of this run so far.
    pub fn meta(&self) -> RunMeta {
        self.shared.meta()
    }

    /// Name of this run.
    pub fn name(&self) -> String {
        run_name(self.shared.ordinal)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run", &self.shared.ordinal)
            .finish_non_exhaustive()
    }
}

/// Ordered chain of actions. Each appended action may only be chosen after
/// the previous one of the same sequence has been invoked.
#[derive(Clone)]
pub struct Sequence {
    id: SequenceId,
    shared: Arc<RunShared>,
}

impl Sequence {
    /// Identity of the sequence within its run.
    pub const fn id(&self) -> SequenceId {
        self.id
    }

    /// Append an instantaneous action.
    pub fn later<F>(&self, action: F) -> Self
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.later_as(default_label::<F>(), action)
    }

    /// Append a labelled instantaneous action.
    pub fn later_as<F>(&self, label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.shared
            .schedule(self.id, label.into(), Work::Instant(Box::new(action)));
        self.clone()
    }

    /// Append a duration action.
    pub fn later_ready<F>(&self, action: F) -> Self
    where
        F: FnOnce(Ready) -> AppResult<()> + Send + 'static,
    {
        self.later_ready_as(default_label::<F>(), action)
    }

    /// Append a labelled duration action.
    pub fn later_ready_as<F>(&self, label: impl Into<String>, action: F) -> Self
    where
        F: FnOnce(Ready) -> AppResult<()> + Send + 'static,
    {
        self.shared
            .schedule(self.id, label.into(), Work::Duration(Box::new(action)));
        self.clone()
    }

    /// Append an instantaneous action whose result is delivered to the
    /// returned [`Promise`] when the engine executes it.
    pub fn promise<T, F>(&self, label: impl Into<String>, action: F) -> Promise<T>
    where
        T: Send + 'static,
        F: FnOnce() -> AppResult<T> + Send + 'static,
    {
        let label = label.into();
        let (tx, rx) = oneshot::channel();
        self.shared.schedule(
            self.id,
            label.clone(),
            Work::Instant(Box::new(move || deliver(tx, action()))),
        );
        Promise::new(rx, label, Some(self.clone()))
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("id", &self.id)
            .field("run", &self.shared.ordinal)
            .finish()
    }
}

enum Advance {
    Step(PoolEntry),
    Idle,
    Finished,
}

/// Executes one run along a recorded path, discovering past its end.
pub(crate) struct RunDriver<'a> {
    tree: &'a mut DecisionTree,
    shared: Arc<RunShared>,
    settings: &'a RunSettings,
    parent: Option<NodeId>,
}

impl<'a> RunDriver<'a> {
    pub(crate) fn new(
        tree: &'a mut DecisionTree,
        path: Path,
        ordinal: usize,
        settings: &'a RunSettings,
    ) -> Self {
        Self {
            tree,
            shared: Arc::new(RunShared::new(ordinal, path)),
            settings,
            parent: None,
        }
    }

    /// Drive the run to its end and hand back the (possibly extended) path.
    pub(crate) async fn drive(mut self, test_case: &TestCase) -> (Path, RunMeta, Result<(), ExploreError>) {
        let outcome = self.execute(test_case).await;
        let (path, meta) = self.shared.close();
        (path, meta, outcome)
    }

    async fn execute(&mut self, test_case: &TestCase) -> Result<(), ExploreError> {
        let context = RunContext {
            shared: Arc::clone(&self.shared),
        };
        guarded(|| test_case(context)).map_err(|e| ExploreError::action_fault("test case", e))?;

        loop {
            match self.advance()? {
                Advance::Step(entry) => {
                    self.invoke(entry)?;
                    self.settings.enqueue.defer().await;
                }
                Advance::Idle => self.idle().await?,
                Advance::Finished => return Ok(()),
            }
        }
    }

    fn advance(&mut self) -> Result<Advance, ExploreError> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        if let Some(error) = state.failure.take() {
            return Err(error);
        }
        if state.pool.is_empty() {
            if !state.done {
                return Ok(Advance::Idle);
            }
            if state.depth < state.path.len() {
                return Err(ExploreError::PrematureCompletion {
                    pending: state.path.len() - state.depth,
                });
            }
            return Ok(Advance::Finished);
        }

        let depth = state.depth;
        let previous = depth.checked_sub(1).and_then(|d| state.path.get(d));
        let entry = if let Some(expected) = state.path.get(depth) {
            let node = match (self.parent, previous) {
                (Some(parent), Some(key)) => self.tree.child(parent, key),
                _ => self.tree.root(),
            }
            .ok_or_else(|| ExploreError::Internal(format!("no recorded node at depth {depth}")))?;
            let recorded = self
                .tree
                .node(node)
                .map(Node::pool)
                .ok_or_else(|| ExploreError::Internal(format!("dangling node at depth {depth}")))?;
            // The step must see the frontier it saw when this depth was recorded.
            if state.pool.lags(recorded) {
                return Ok(Advance::Idle);
            }
            let entry = match state.pool.select_replay(expected) {
                Choice::Take(entry) => entry,
                Choice::Blocked => return Ok(Advance::Idle),
                Choice::Absent => {
                    return Err(ExploreError::NonDeterministic {
                        depth,
                        expected: expected.clone(),
                    })
                }
            };
            state.held = running_keys(recorded);
            self.parent = Some(node);
            entry
        } else {
            if !state.pool.can_discover() {
                return Ok(Advance::Idle);
            }
            let snapshot = state.pool.snapshot();
            state.held = running_keys(&snapshot);
            let parent = self.parent.zip(previous);
            self.parent = Some(self.tree.record(parent, snapshot)?);
            let Choice::Take(entry) = state.pool.select_discover() else {
                return Err(ExploreError::Internal("discovery candidate vanished".into()));
            };
            state.path.push(entry.key.clone());
            entry
        };
        state.depth += 1;
        Ok(Advance::Step(entry))
    }

    fn invoke(&self, entry: PoolEntry) -> Result<(), ExploreError> {
        let PoolEntry { id, key, work } = entry;
        tracing::debug!(key = %key, kind = ?work.kind(), "invoking");
        let outcome = match work {
            Work::Instant(step) | Work::Resume(Some(step)) => guarded(step),
            Work::Duration(body) => {
                let ready = Ready::new(
                    Arc::downgrade(&self.shared),
                    id,
                    key.label().to_string(),
                    Arc::clone(&self.settings.spawner),
                );
                guarded(move || body(ready))
            }
            Work::Resume(None) => {
                return Err(ExploreError::Internal(format!("{key} selected while running")));
            }
        };
        outcome.map_err(|error| ExploreError::action_fault(key.to_string(), error))
    }

    async fn idle(&self) -> Result<(), ExploreError> {
        let notified = self.shared.wake.notified();
        match self.settings.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, notified)
                .await
                .map_err(|_| ExploreError::Stalled(limit)),
            None => {
                notified.await;
                Ok(())
            }
        }
    }
}

fn running_keys(snapshot: &[SnapshotEntry]) -> Vec<ActionKey> {
    snapshot
        .iter()
        .filter(|entry| entry.running)
        .map(|entry| entry.key.clone())
        .collect()
}

/// Run user code, turning a panic into an error.
fn guarded<R>(f: impl FnOnce() -> AppResult<R>) -> AppResult<R> {
    std::panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(anyhow::anyhow!("panicked: {}", panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
