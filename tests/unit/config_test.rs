//! Tests for configuration validation

use prometheus_interleave::config::{EnqueueConfig, ExploreConfig, DEFAULT_IDLE_TIMEOUT_MS};

#[test]
fn test_default_config() {
    let cfg = ExploreConfig::default();
    assert_eq!(cfg.max_runs, None);
    assert_eq!(cfg.idle_timeout_ms, Some(DEFAULT_IDLE_TIMEOUT_MS));
    assert_eq!(cfg.enqueue, EnqueueConfig::YieldNow);
    assert_eq!(cfg.retries, 0);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_invalid_max_runs() {
    assert!(ExploreConfig::default().with_max_runs(0).validate().is_err());
}

#[test]
fn test_invalid_idle_timeout() {
    let cfg = ExploreConfig::default().with_idle_timeout_ms(Some(0));
    assert!(cfg.validate().is_err());
    assert!(ExploreConfig::default()
        .with_idle_timeout_ms(None)
        .validate()
        .is_ok());
}

#[test]
fn test_from_json_str() {
    let json = r#"{ "max_runs": 24, "enqueue": "immediate", "retries": 1 }"#;
    let cfg = ExploreConfig::from_json_str(json).expect("valid config");
    assert_eq!(cfg.max_runs, Some(24));
    assert_eq!(cfg.retries, 1);
    assert_eq!(cfg.enqueue, EnqueueConfig::Immediate);
    // Omitted fields keep their defaults.
    assert_eq!(cfg.idle_timeout_ms, Some(DEFAULT_IDLE_TIMEOUT_MS));
}

#[test]
fn test_from_json_str_invalid() {
    assert!(ExploreConfig::from_json_str(r#"{ "max_runs": 0 }"#).is_err());
    assert!(ExploreConfig::from_json_str(r#"{ "enqueue": "sometime" }"#).is_err());
    assert!(ExploreConfig::from_json_str("not json").is_err());
}

#[test]
fn test_config_roundtrip_through_json() {
    let cfg = ExploreConfig::default()
        .with_max_runs(3)
        .with_enqueue(EnqueueConfig::Immediate);
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains("\"immediate\""));
    assert_eq!(ExploreConfig::from_json_str(&json).unwrap(), cfg);
}
