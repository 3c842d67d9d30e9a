//! Frontier of a run: every action that is scheduled or in flight.
//!
//! Entries are kept sorted by [`ActionKey`], so the discovery candidate is
//! always the first entry and a snapshot is a plain copy of the keys.

use serde::{Deserialize, Serialize};

use crate::core::action::{ActionKey, Step, Work};

/// Identifier of a pool entry, shared by a duration action and its placeholder.
pub(crate) type EntryId = u64;

/// One entry of a recorded pool snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Composite key of the entry.
    pub key: ActionKey,
    /// Whether the entry was an unresolved placeholder when recorded.
    pub running: bool,
}

impl SnapshotEntry {
    /// Position of the entry within its sequence.
    pub fn position(&self) -> usize {
        self.key.position()
    }
}

#[derive(Debug)]
pub(crate) struct PoolEntry {
    pub id: EntryId,
    pub key: ActionKey,
    pub work: Work,
}

impl PoolEntry {
    fn is_running(&self) -> bool {
        matches!(self.work, Work::Resume(None))
    }
}

/// Outcome of asking the pool for the next step.
#[derive(Debug)]
pub(crate) enum Choice {
    /// The entry was removed from the pool and must be executed.
    Take(PoolEntry),
    /// The wanted entry is still running; nothing can be decided yet.
    Blocked,
    /// Replay wanted a key that is not in the pool.
    Absent,
}

#[derive(Debug, Default)]
pub(crate) struct Pool {
    entries: Vec<PoolEntry>,
    next_id: EntryId,
}

impl Pool {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that are not waiting on a completion signal.
    /// Entries keyed in `held` count as waiting even if they have resolved.
    pub fn selectable_except(&self, held: &[ActionKey]) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.is_running() && !held.contains(&e.key))
            .count()
    }

    /// Add a freshly scheduled action.
    pub fn push(&mut self, key: ActionKey, work: Work) -> EntryId {
        let id = self.next_id;
        self.next_id += 1;
        self.insert(PoolEntry { id, key, work });
        id
    }

    fn insert(&mut self, entry: PoolEntry) {
        match self.entries.binary_search_by(|e| e.key.cmp(&entry.key)) {
            Ok(index) => {
                // Keys are unique per run; a clash means a caller reused a key.
                tracing::error!(key = %entry.key, "duplicate key in pool");
                self.entries.insert(index + 1, entry);
            }
            Err(index) => self.entries.insert(index, entry),
        }
    }

    /// Keys and running flags of every entry, in discovery order.
    pub fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.entries
            .iter()
            .map(|e| SnapshotEntry {
                key: e.key.clone(),
                running: e.is_running(),
            })
            .collect()
    }

    /// Whether discovery can decide right now.
    pub fn can_discover(&self) -> bool {
        self.entries.first().is_some_and(|e| !e.is_running())
    }

    /// Discovery: the smallest key, unless it is still running.
    pub fn select_discover(&mut self) -> Choice {
        if self.entries.is_empty() {
            return Choice::Absent;
        }
        if !self.can_discover() {
            return Choice::Blocked;
        }
        Choice::Take(self.take(0))
    }

    /// Whether an entry that `recorded` saw resolved is still running here.
    pub fn lags(&self, recorded: &[SnapshotEntry]) -> bool {
        recorded.iter().filter(|r| !r.running).any(|r| {
            self.entries
                .binary_search_by(|e| e.key.cmp(&r.key))
                .is_ok_and(|index| self.entries[index].is_running())
        })
    }

    /// Replay: exactly the key recorded on the path.
    pub fn select_replay(&mut self, key: &ActionKey) -> Choice {
        match self.entries.binary_search_by(|e| e.key.cmp(key)) {
            Err(_) => Choice::Absent,
            Ok(index) if self.entries[index].is_running() => Choice::Blocked,
            Ok(index) => Choice::Take(self.take(index)),
        }
    }

    /// Remove an entry. A duration action leaves a running placeholder behind.
    fn take(&mut self, index: usize) -> PoolEntry {
        let entry = self.entries.remove(index);
        if matches!(entry.work, Work::Duration(_)) {
            self.insert(PoolEntry {
                id: entry.id,
                key: entry.key.resumed(),
                work: Work::Resume(None),
            });
        }
        entry
    }

    /// Store the continuation of a running placeholder. Hands the
    /// continuation back when no running placeholder carries `id`.
    pub fn resolve(&mut self, id: EntryId, continuation: Step) -> Result<(), Step> {
        match self
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.is_running())
        {
            Some(entry) => {
                entry.work = Work::Resume(Some(continuation));
                Ok(())
            }
            None => Err(continuation),
        }
    }
}
