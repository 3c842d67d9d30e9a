//! Builder assembling an [`Explorer`] from configuration and runtime hooks.

use std::sync::Arc;

use crate::config::{EnqueueConfig, ExploreConfig};
use crate::core::error::{AppResult, ExploreError};
use crate::core::explorer::{erase, Explorer};
use crate::core::run::{RunContext, RunSettings, TestCase};
use crate::runtime::{Enqueue, Immediate, Spawn, TokioSpawner, YieldNow};

/// Builds an [`Explorer`], validating its configuration.
pub struct ExplorerBuilder {
    test_case: TestCase,
    config: ExploreConfig,
    enqueue: Option<Arc<dyn Enqueue>>,
    spawner: Option<Arc<dyn Spawn>>,
}

impl ExplorerBuilder {
    /// Start from the default configuration.
    pub fn new<F>(test_case: F) -> Self
    where
        F: Fn(RunContext) -> AppResult<()> + Send + Sync + 'static,
    {
        Self {
            test_case: erase(test_case),
            config: ExploreConfig::default(),
            enqueue: None,
            spawner: None,
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn config(mut self, config: ExploreConfig) -> Self {
        self.config = config;
        self
    }

    /// Cap the number of runs.
    #[must_use]
    pub fn max_runs(mut self, max_runs: usize) -> Self {
        self.config.max_runs = Some(max_runs);
        self
    }

    /// Use a custom strategy between steps instead of the configured one.
    #[must_use]
    pub fn enqueue(mut self, enqueue: Arc<dyn Enqueue>) -> Self {
        self.enqueue = Some(enqueue);
        self
    }

    /// Spawn bridged futures through `spawner` instead of the current runtime.
    #[must_use]
    pub fn spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Configuration the explorer will be built with.
    pub const fn settings(&self) -> &ExploreConfig {
        &self.config
    }

    /// Validate and build.
    pub fn build(self) -> Result<Explorer, ExploreError> {
        self.config.validate().map_err(ExploreError::InvalidConfig)?;
        let enqueue = self.enqueue.unwrap_or_else(|| match self.config.enqueue {
            EnqueueConfig::YieldNow => Arc::new(YieldNow),
            EnqueueConfig::Immediate => Arc::new(Immediate),
        });
        let settings = RunSettings {
            max_runs: self.config.max_runs,
            idle_timeout: self.config.idle_timeout(),
            enqueue,
            spawner: self
                .spawner
                .unwrap_or_else(|| Arc::new(TokioSpawner::current())),
        };
        tracing::debug!(config = ?self.config, "explorer built");
        Ok(Explorer::from_parts(self.test_case, settings))
    }
}

impl std::fmt::Debug for ExplorerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorerBuilder")
            .field("config", &self.config)
            .field("custom_enqueue", &self.enqueue.is_some())
            .field("custom_spawner", &self.spawner.is_some())
            .finish_non_exhaustive()
    }
}
