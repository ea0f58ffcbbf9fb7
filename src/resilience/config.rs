//! # Circuit Breaker Configuration
//!
//! Configuration structure and validation for a single circuit breaker.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,

    /// Cool-down spent in the open state before a trial call is permitted
    pub reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Create configuration for the downstream provider
    pub fn for_external_provider() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }

    /// Create configuration for graph loading
    pub fn for_graph_loader() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(15),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.failure_threshold > 100 {
            return Err("failure_threshold should not exceed 100".to_string());
        }

        if self.reset_timeout.is_zero() {
            return Err("reset_timeout must be greater than 0".to_string());
        }

        if self.reset_timeout > Duration::from_secs(300) {
            return Err("reset_timeout should not exceed 300 seconds".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::for_external_provider()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CircuitBreakerConfig::default().validate().is_ok());
        assert!(CircuitBreakerConfig::for_graph_loader().validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let zero_threshold = CircuitBreakerConfig {
            failure_threshold: 0,
            ..Default::default()
        };
        assert!(zero_threshold.validate().is_err());

        let zero_timeout = CircuitBreakerConfig {
            reset_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());
    }
}
