//! Tests for error types

use std::error::Error as _;
use std::time::Duration;

use prometheus_interleave::core::{ActionKey, ExploreError, SequenceId, Stage};

fn key(labels: &[&str]) -> ActionKey {
    ActionKey::new(
        SequenceId(1),
        labels.iter().map(|l| (*l).to_string()).collect(),
        Stage::Invoke,
    )
}

#[test]
fn test_non_deterministic_error() {
    let err = ExploreError::NonDeterministic {
        depth: 2,
        expected: key(&["read", "write"]),
    };
    assert_eq!(
        err.to_string(),
        "non-deterministic test case: expected choice not available at depth 2: #1:read > write"
    );
}

#[test]
fn test_premature_completion_error() {
    let err = ExploreError::PrematureCompletion { pending: 2 };
    assert_eq!(
        err.to_string(),
        "done() called before test case completion (2 action(s) still pending)"
    );
}

#[test]
fn test_max_runs_error() {
    assert_eq!(ExploreError::MaxRunsExceeded(5).to_string(), "max runs exceeded: 5");
}

#[test]
fn test_stalled_error() {
    let err = ExploreError::Stalled(Duration::from_millis(250));
    assert_eq!(err.to_string(), "run stalled: no progress for 250ms and done() not called");
}

#[test]
fn test_invalid_config_error() {
    let err = ExploreError::InvalidConfig("max_runs must be greater than 0".into());
    assert_eq!(err.to_string(), "invalid configuration: max_runs must be greater than 0");
    assert!(err.is_fatal());
}

#[test]
fn test_action_fault_keeps_source() {
    let err = ExploreError::ActionFault {
        label: "#0:A".into(),
        source: "disk on fire".into(),
    };
    assert_eq!(err.to_string(), "action `#0:A` failed: disk on fire");
    assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("disk on fire"));
    assert!(!err.is_fatal());
}
