//! Action and sequence model: composite keys and schedulable work.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::AppResult;
use crate::core::ready::Ready;

/// Identity of a sequence within one run, in order of creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub u32);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which half of an action a key refers to.
///
/// Instantaneous actions only ever have an `Invoke` step. Duration actions
/// contribute a second decision point, `Resume`, for running the continuation
/// handed to their completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// The action body itself.
    Invoke,
    /// The continuation stored by the action's completion signal.
    Resume,
}

/// Whether an action finishes synchronously or awaits a completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Runs and returns synchronously.
    Instantaneous,
    /// Receives a [`Ready`] and finishes when it is resolved.
    Duration,
}

/// Composite key of a decision: the sequence, its label history up to and
/// including the action, and the stage.
///
/// The derived ordering is the discovery order: sequence first, then label
/// history (a prefix sorts before its extensions), then stage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionKey {
    /// Sequence the action belongs to.
    pub sequence: SequenceId,
    /// Labels of the sequence from position 0 through this action.
    pub labels: Vec<String>,
    /// Invocation or resumption.
    pub stage: Stage,
}

impl ActionKey {
    /// Build a key. `labels` must not be empty.
    pub const fn new(sequence: SequenceId, labels: Vec<String>, stage: Stage) -> Self {
        Self {
            sequence,
            labels,
            stage,
        }
    }

    /// Zero-based position of the action within its sequence.
    pub fn position(&self) -> usize {
        self.labels.len().saturating_sub(1)
    }

    /// Label of the action itself.
    pub fn label(&self) -> &str {
        self.labels.last().map_or("", String::as_str)
    }

    /// Key of the resumption step of this action.
    pub(crate) fn resumed(&self) -> Self {
        Self {
            stage: Stage::Resume,
            ..self.clone()
        }
    }

    /// Key that must already be on the path before this one may be chosen.
    ///
    /// A resumption follows its own invocation; an invocation at position
    /// `p > 0` follows the invocation at `p - 1`; position 0 is always legal.
    pub fn predecessor(&self) -> Option<Self> {
        match self.stage {
            Stage::Resume => Some(Self {
                stage: Stage::Invoke,
                ..self.clone()
            }),
            Stage::Invoke if self.labels.len() > 1 => Some(Self {
                sequence: self.sequence,
                labels: self.labels[..self.labels.len() - 1].to_vec(),
                stage: Stage::Invoke,
            }),
            Stage::Invoke => None,
        }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sequence, self.labels.join(" > "))?;
        if self.stage == Stage::Resume {
            write!(f, " (resume)")?;
        }
        Ok(())
    }
}

/// Synchronous step: an instantaneous action or a stored continuation.
pub(crate) type Step = Box<dyn FnOnce() -> AppResult<()> + Send + 'static>;

/// Duration action body, handed its completion signal on invocation.
pub(crate) type Timed = Box<dyn FnOnce(Ready) -> AppResult<()> + Send + 'static>;

/// Work carried by a pool entry.
pub(crate) enum Work {
    Instant(Step),
    Duration(Timed),
    /// Placeholder of a started duration action; `None` while still running.
    Resume(Option<Step>),
}

impl Work {
    pub(crate) fn kind(&self) -> ActionKind {
        match self {
            Self::Instant(_) => ActionKind::Instantaneous,
            Self::Duration(_) | Self::Resume(_) => ActionKind::Duration,
        }
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instant(_) => f.write_str("Instant"),
            Self::Duration(_) => f.write_str("Duration"),
            Self::Resume(step) => write!(f, "Resume(resolved: {})", step.is_some()),
        }
    }
}

/// Label used when the author supplies none: the type name of the work.
pub(crate) fn default_label<F>() -> String {
    std::any::type_name::<F>().to_string()
}
