//! Decision tree and path: the record of every decision point explored so far
//! and the depth-first search for the next untried interleaving.
//!
//! Nodes live in an arena and refer to their children by index, so copying
//! an exploration is a plain structural clone.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::action::ActionKey;
use crate::core::error::ExploreError;
use crate::core::pool::SnapshotEntry;

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

/// A decision point: the pool seen at that depth and the branches taken.
#[derive(Debug, Clone)]
pub struct Node {
    pool: Vec<SnapshotEntry>,
    children: HashMap<ActionKey, NodeId>,
}

impl Node {
    /// Pool snapshot recorded when the depth was first reached.
    pub fn pool(&self) -> &[SnapshotEntry] {
        &self.pool
    }

    /// Number of branches explored from this node.
    pub fn explored(&self) -> usize {
        self.children.len()
    }
}

/// Ordered keys chosen at each depth of the current interleaving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    keys: Vec<ActionKey>,
}

impl Path {
    /// Number of recorded decisions.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no decision is recorded.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key chosen at `depth`.
    pub fn get(&self, depth: usize) -> Option<&ActionKey> {
        self.keys.get(depth)
    }

    /// All keys in order.
    pub fn keys(&self) -> &[ActionKey] {
        &self.keys
    }

    /// Whether `key` was chosen at any depth.
    pub fn contains(&self, key: &ActionKey) -> bool {
        self.keys.contains(key)
    }

    pub(crate) fn push(&mut self, key: ActionKey) {
        self.keys.push(key);
    }

    fn pop(&mut self) -> Option<ActionKey> {
        self.keys.pop()
    }

    /// Keys already consumed by a run that reached `depth`.
    pub fn trace(&self, depth: usize) -> Vec<ActionKey> {
        self.keys[..depth.min(self.keys.len())].to_vec()
    }

    /// Keys expected but not reached by a run that stopped at `depth`.
    pub fn todo(&self, depth: usize) -> Vec<ActionKey> {
        self.keys[depth.min(self.keys.len())..].to_vec()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, key) in self.keys.iter().enumerate() {
            if depth > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

/// Every decision point reached by any run of one exploration.
#[derive(Debug, Clone, Default)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Number of recorded decision points.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no run has made a decision yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node of depth 0, once recorded.
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(NodeId(0))
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Child reached from `parent` by choosing `key`.
    pub fn child(&self, parent: NodeId, key: &ActionKey) -> Option<NodeId> {
        self.nodes.get(parent.0)?.children.get(key).copied()
    }

    /// Record the node of a depth reached for the first time.
    ///
    /// `parent` is the node of the previous depth and the key chosen there;
    /// `None` records the root.
    pub(crate) fn record(
        &mut self,
        parent: Option<(NodeId, &ActionKey)>,
        pool: Vec<SnapshotEntry>,
    ) -> Result<NodeId, ExploreError> {
        let id = NodeId(self.nodes.len());
        match parent {
            None if self.nodes.is_empty() => {}
            None => return Err(ExploreError::Internal("root recorded twice".into())),
            Some((parent, key)) => {
                let node = self
                    .nodes
                    .get_mut(parent.0)
                    .ok_or_else(|| ExploreError::Internal(format!("parent node {} missing", parent.0)))?;
                if node.children.insert(key.clone(), id).is_some() {
                    return Err(ExploreError::Internal(format!("branch {key} recorded twice")));
                }
            }
        }
        self.nodes.push(Node {
            pool,
            children: HashMap::new(),
        });
        Ok(id)
    }

    /// Node reached by following `keys` from the root.
    pub fn walk(&self, keys: &[ActionKey]) -> Result<NodeId, ExploreError> {
        let mut current = self
            .root()
            .ok_or_else(|| ExploreError::Internal("node not found at path: tree is empty".into()))?;
        for key in keys {
            current = self
                .child(current, key)
                .ok_or_else(|| ExploreError::Internal(format!("node not found at path after {key}")))?;
        }
        Ok(current)
    }

    /// Move `path` to the next unexplored interleaving.
    ///
    /// Returns `Ok(false)` once every interleaving has been tried; `path` is
    /// then empty.
    pub fn backtrack(&self, path: &mut Path) -> Result<bool, ExploreError> {
        while let Some(tried) = path.pop() {
            let node = &self.nodes[self.walk(path.keys())?.0];
            let index = node
                .pool
                .iter()
                .position(|entry| entry.key == tried)
                .ok_or_else(|| ExploreError::Internal(format!("{tried} missing from its own node")))?;

            let next = node.pool[index + 1..].iter().find(|entry| {
                entry
                    .key
                    .predecessor()
                    .map_or(true, |before| path.contains(&before))
            });

            if let Some(entry) = next {
                tracing::debug!(depth = path.len(), key = %entry.key, "backtracked to sibling");
                path.push(entry.key.clone());
                return Ok(true);
            }
        }
        Ok(false)
    }
}
