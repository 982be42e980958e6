//! Engine configuration

use findora_core::Result;
use findora_similarity::{ConfigError, SimilarityConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration, loadable from a JSON file.
///
/// Every section falls back to its defaults, so `{}` is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub similarity: SimilarityConfig,
    pub worker: WorkerConfig,
    /// Keep only the best `k` matches found by one run (`None` keeps all)
    pub max_matches_per_item: Option<usize>,
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: EngineConfig = serde_json::from_str(json)?;
        config.validate_and_normalize()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn validate_and_normalize(&mut self) -> std::result::Result<(), ConfigError> {
        self.similarity.validate_and_normalize()?;
        self.worker.validate()?;
        if self.max_matches_per_item == Some(0) {
            return Err(ConfigError::OutOfRange {
                field: "max_matches_per_item".to_string(),
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Intake worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    pub threads: usize,
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 2,
            retry: RetryPolicy::default(),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::OutOfRange {
                field: "worker.threads".to_string(),
                value: 0.0,
            });
        }
        self.retry.validate()
    }
}

/// Exponential backoff for runs that fail with a retryable error
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                field: "worker.retry.max_attempts".to_string(),
                value: 0.0,
            });
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::Inconsistent(format!(
                "base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base,
    /// capped at `max_delay_ms`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}
