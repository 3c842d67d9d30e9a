//! Tests for utility functions

use prometheus_interleave::util::{init_tracing, run_name};

#[test]
fn test_run_names_follow_alphabet() {
    let names: Vec<String> = (1..=3).map(run_name).collect();
    assert_eq!(names, ["a", "b", "c"]);
    assert_eq!(run_name(26 * 26 + 26), "zz");
    assert_eq!(run_name(26 * 26 + 27), "baa");
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
