//! Exploration configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default idle timeout in milliseconds.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 10_000;

/// Strategy the driver uses between two steps of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueConfig {
    /// Yield to the async scheduler after every step.
    #[default]
    YieldNow,
    /// Execute steps back to back.
    Immediate,
}

impl std::str::FromStr for EnqueueConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "yield_now" => Ok(Self::YieldNow),
            "immediate" => Ok(Self::Immediate),
            other => Err(format!("unknown enqueue strategy `{other}`")),
        }
    }
}

/// Settings of one exploration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExploreConfig {
    /// Cap on the number of runs; `None` explores until exhaustion.
    pub max_runs: Option<usize>,
    /// How long an idle run may wait for a completion or `done()` before it
    /// fails as stalled; `None` waits forever. Must exceed the longest
    /// duration action of the test case.
    pub idle_timeout_ms: Option<u64>,
    /// Strategy between two steps.
    pub enqueue: EnqueueConfig,
    /// How many times the test harness re-runs a failed interleaving, from a
    /// copy of the exploration taken before it, before reporting it.
    pub retries: u32,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            max_runs: None,
            idle_timeout_ms: Some(DEFAULT_IDLE_TIMEOUT_MS),
            enqueue: EnqueueConfig::default(),
            retries: 0,
        }
    }
}

impl ExploreConfig {
    /// Cap the number of runs.
    #[must_use]
    pub fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = Some(max_runs);
        self
    }

    /// Set or disable the idle timeout.
    #[must_use]
    pub fn with_idle_timeout_ms(mut self, idle_timeout_ms: Option<u64>) -> Self {
        self.idle_timeout_ms = idle_timeout_ms;
        self
    }

    /// Choose the strategy between steps.
    #[must_use]
    pub fn with_enqueue(mut self, enqueue: EnqueueConfig) -> Self {
        self.enqueue = enqueue;
        self
    }

    /// Re-run failed interleavings up to `retries` times.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Idle timeout as a duration.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_runs == Some(0) {
            return Err("max_runs must be greater than 0".into());
        }
        if self.idle_timeout_ms == Some(0) {
            return Err("idle_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `INTERLEAVE_*` environment variables, after
    /// loading a `.env` file if present. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Some(raw) = lookup("INTERLEAVE_MAX_RUNS") {
            cfg.max_runs = Some(
                raw.trim()
                    .parse()
                    .map_err(|e| format!("INTERLEAVE_MAX_RUNS: {e}"))?,
            );
        }
        if let Some(raw) = lookup("INTERLEAVE_IDLE_TIMEOUT_MS") {
            cfg.idle_timeout_ms = match raw.trim() {
                "none" | "off" => None,
                value => Some(
                    value
                        .parse()
                        .map_err(|e| format!("INTERLEAVE_IDLE_TIMEOUT_MS: {e}"))?,
                ),
            };
        }
        if let Some(raw) = lookup("INTERLEAVE_RETRIES") {
            cfg.retries = raw
                .trim()
                .parse()
                .map_err(|e| format!("INTERLEAVE_RETRIES: {e}"))?;
        }
        if let Some(raw) = lookup("INTERLEAVE_ENQUEUE") {
            cfg.enqueue = raw.parse().map_err(|e| format!("INTERLEAVE_ENQUEUE: {e}"))?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
