//! Fleet configuration.
//!
//! One `FleetConfig` is shared by every batch a dispatcher handles. It is read
//! each time a dispatch slot is about to be filled, so changes apply to tasks
//! not yet dispatched and never to in-flight work.

use serde::{Deserialize, Serialize};

use super::errors::{FleetError, FleetResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Upper bound on simultaneously in-flight executions. Must be >= 1.
    pub max_concurrent_workers: usize,

    /// Advisory per-attempt timeout handed to executors. The dispatcher does
    /// not preempt a stalled execution.
    pub worker_timeout_ms: u64,

    pub retry_failed_tasks: bool,

    /// Retries allowed per task, not counting the first attempt.
    pub max_retries: u32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            max_concurrent_workers: 10,
            worker_timeout_ms: 300_000,
            retry_failed_tasks: true,
            max_retries: 3,
        }
    }
}

impl FleetConfig {
    pub fn validate(&self) -> FleetResult<()> {
        if self.max_concurrent_workers < 1 {
            return Err(FleetError::Validation(format!(
                "max_concurrent_workers must be at least 1, got {}",
                self.max_concurrent_workers
            )));
        }
        Ok(())
    }

    /// Parse a TOML document; missing keys fall back to defaults.
    ///
    /// ```toml
    /// max_concurrent_workers = 4
    /// retry_failed_tasks = false
    /// ```
    pub fn from_toml_str(s: &str) -> FleetResult<Self> {
        let config: FleetConfig =
            toml::from_str(s).map_err(|e| FleetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Merge `patch` into a copy of `self`. Fields absent from the patch keep
    /// their current value; the result is validated before it is returned.
    pub fn merged(&self, patch: &FleetConfigPatch) -> FleetResult<Self> {
        let mut next = self.clone();
        if let Some(n) = patch.max_concurrent_workers {
            next.max_concurrent_workers = n;
        }
        if let Some(ms) = patch.worker_timeout_ms {
            next.worker_timeout_ms = ms;
        }
        if let Some(retry) = patch.retry_failed_tasks {
            next.retry_failed_tasks = retry;
        }
        if let Some(max) = patch.max_retries {
            next.max_retries = max;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Partial update for [`FleetConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfigPatch {
    pub max_concurrent_workers: Option<usize>,
    pub worker_timeout_ms: Option<u64>,
    pub retry_failed_tasks: Option<bool>,
    pub max_retries: Option<u32>,
}
