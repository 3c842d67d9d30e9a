//! Error types for exploration and run failures.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::core::action::ActionKey;
use crate::core::run::RunMeta;

/// Errors produced while exploring interleavings.
#[derive(Debug, Error)]
pub enum ExploreError {
    /// Replay expected a key in the frontier and it was not there: the test
    /// case behaved differently across runs sharing the same path prefix.
    #[error("non-deterministic test case: expected choice not available at depth {depth}: {expected}")]
    NonDeterministic {
        /// Depth at which the replay diverged.
        depth: usize,
        /// Key the recorded path expected.
        expected: ActionKey,
    },
    /// The completion entry point was called while unconsumed actions remained.
    #[error("done() called before test case completion ({pending} action(s) still pending)")]
    PrematureCompletion {
        /// Selectable actions left in the pool, plus replayed steps not reached yet.
        pending: usize,
    },
    /// The configured run cap was reached before exploration finished.
    #[error("max runs exceeded: {0}")]
    MaxRunsExceeded(usize),
    /// An action, continuation or the test case body failed or panicked.
    #[error("action `{label}` failed: {source}")]
    ActionFault {
        /// Label of the failing action.
        label: String,
        /// The user error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    /// A completion signal was dropped without being resolved.
    #[error("completion signal of `{0}` dropped without being resolved")]
    CompletionDropped(String),
    /// The run neither advanced nor completed within the idle timeout.
    #[error("run stalled: no progress for {0:?} and done() not called")]
    Stalled(Duration),
    /// The run ended before a promised action was executed.
    #[error("run ended before `{0}` was executed")]
    Abandoned(String),
    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Engine bookkeeping is inconsistent. Always a bug in this crate.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExploreError {
    pub(crate) fn action_fault(label: impl Into<String>, error: anyhow::Error) -> Self {
        Self::ActionFault {
            label: label.into(),
            source: error.into(),
        }
    }

    /// Whether the error ends the whole exploration rather than a single run.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NonDeterministic { .. }
                | Self::MaxRunsExceeded(_)
                | Self::InvalidConfig(_)
                | Self::Internal(_)
        )
    }
}

/// Application-facing result used by test cases, actions and continuations.
pub type AppResult<T> = Result<T, anyhow::Error>;

/// A failed run together with the diagnostics of where it failed.
#[derive(Debug)]
pub struct RunFailure {
    /// What went wrong.
    pub error: ExploreError,
    /// Run the failure belongs to.
    pub meta: RunMeta,
}

impl RunFailure {
    pub(crate) const fn new(error: ExploreError, meta: RunMeta) -> Self {
        Self { error, meta }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run [{}] failed: {}", self.meta.name, self.error)?;
        for key in &self.meta.trace {
            writeln!(f, "  after {key}")?;
        }
        for key in &self.meta.todo {
            writeln!(f, " before {key}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{SequenceId, Stage};

    fn key(label: &str) -> ActionKey {
        ActionKey::new(SequenceId(0), vec![label.to_string()], Stage::Invoke)
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ExploreError::MaxRunsExceeded(3).is_fatal());
        assert!(ExploreError::Internal("x".into()).is_fatal());
        assert!(ExploreError::NonDeterministic { depth: 0, expected: key("a") }.is_fatal());
        assert!(!ExploreError::PrematureCompletion { pending: 1 }.is_fatal());
        assert!(!ExploreError::Stalled(Duration::from_millis(5)).is_fatal());
        assert!(!ExploreError::action_fault("a", anyhow::anyhow!("boom")).is_fatal());
    }

    #[test]
    fn test_failure_report_lists_trace_and_todo() {
        let failure = RunFailure::new(
            ExploreError::PrematureCompletion { pending: 1 },
            RunMeta {
                ordinal: 3,
                name: "c".into(),
                trace: vec![key("A")],
                todo: vec![key("B")],
            },
        );
        let text = failure.to_string();
        assert!(text.starts_with("run [c] failed: done() called before test case completion"));
        assert!(text.contains("  after #0:A\n"));
        assert!(text.contains(" before #0:B\n"));
    }
}
