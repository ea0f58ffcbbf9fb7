//! # Orchestrator Configuration
//!
//! Typed sections for every tunable of the orchestrator. Each section
//! carries its own defaults, so a partial TOML file or a handful of
//! environment overrides is enough.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use route_orchestrator::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_with_env(Some("config/route-orchestrator.toml".as_ref()))?;
//! let retry = manager.config().to_retry_policy();
//! assert!(retry.max_attempts >= 1);
//! # Ok(())
//! # }
//! ```

pub mod loader;

use crate::error::{Result, RouteError};
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use loader::ConfigManager;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerSettings,
    pub timeouts: TimeoutConfig,
    pub outbox: OutboxConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_seconds: u64,
    /// Store input and algorithmic failures alongside successes
    pub cache_terminal_errors: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl_seconds: 300,
            cache_terminal_errors: true,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter_enabled: bool,
    pub jitter_max_percentage: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter_enabled: true,
            jitter_max_percentage: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Applies when a request carries no `timeout_ms`
    pub default_computation_ms: u64,
    pub graph_load_ms: u64,
    pub schedule_ms: u64,
    pub cancel_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_computation_ms: 5000,
            graph_load_ms: 2000,
            schedule_ms: 500,
            cancel_ms: 500,
        }
    }
}

impl TimeoutConfig {
    pub fn default_computation(&self) -> Duration {
        Duration::from_millis(self.default_computation_ms)
    }

    pub fn graph_load(&self) -> Duration {
        Duration::from_millis(self.graph_load_ms)
    }

    pub fn schedule(&self) -> Duration {
        Duration::from_millis(self.schedule_ms)
    }

    pub fn cancel(&self) -> Duration {
        Duration::from_millis(self.cancel_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// Events claimed per dispatch pass
    pub dispatch_batch_size: usize,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            dispatch_batch_size: 100,
        }
    }
}

/// How long settled requests and outbox events stay queryable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Idle time after which a settled state machine or a delivered or
    /// dead-lettered event may be purged. Replays by key only work inside
    /// this window.
    pub settled_seconds: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            settled_seconds: 86_400,
        }
    }
}

impl RetentionConfig {
    pub fn settled_window(&self) -> Duration {
        Duration::from_secs(self.settled_seconds)
    }
}

impl OrchestratorConfig {
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            multiplier: self.retry.multiplier,
            jitter_enabled: self.retry.jitter_enabled,
            max_jitter: self.retry.jitter_max_percentage,
        }
    }

    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker.failure_threshold,
            reset_timeout: Duration::from_millis(self.circuit_breaker.reset_timeout_ms),
        }
    }

    /// Validate every section, reporting the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            return Err(RouteError::Configuration(
                "cache.max_entries must be greater than 0".to_string(),
            ));
        }
        if self.cache.ttl_seconds == 0 {
            return Err(RouteError::Configuration(
                "cache.ttl_seconds must be greater than 0".to_string(),
            ));
        }

        self.to_retry_policy()
            .validate()
            .map_err(|e| RouteError::Configuration(format!("retry: {e}")))?;
        self.to_breaker_config()
            .validate()
            .map_err(|e| RouteError::Configuration(format!("circuit_breaker: {e}")))?;

        let timeouts = [
            ("default_computation_ms", self.timeouts.default_computation_ms),
            ("graph_load_ms", self.timeouts.graph_load_ms),
            ("schedule_ms", self.timeouts.schedule_ms),
            ("cancel_ms", self.timeouts.cancel_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(RouteError::Configuration(format!(
                "timeouts.{name} must be greater than 0"
            )));
        }

        if self.outbox.dispatch_batch_size == 0 {
            return Err(RouteError::Configuration(
                "outbox.dispatch_batch_size must be greater than 0".to_string(),
            ));
        }
        if self.retention.settled_seconds == 0 {
            return Err(RouteError::Configuration(
                "retention.settled_seconds must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
