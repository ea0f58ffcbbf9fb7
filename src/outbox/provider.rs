//! # Downstream Provider Contract
//!
//! Narrow `schedule`/`cancel` capability of the external provider that
//! receives computed routes. Implementations live outside this crate; tests
//! use scripted doubles.

use crate::constants::provider_status;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Reply from the provider: a status string plus arbitrary data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReply {
    pub status: String,
    #[serde(default)]
    pub data: Value,
}

impl ProviderReply {
    pub fn new(status: impl Into<String>, data: Value) -> Self {
        Self {
            status: status.into(),
            data,
        }
    }

    pub fn confirmed(data: Value) -> Self {
        Self::new(provider_status::CONFIRMED, data)
    }

    /// A schedule reply that actually took effect downstream.
    ///
    /// Any status other than CONFIRMED or PENDING, or a payload flagging
    /// `downstream_fail`, proves the confirmation invalid.
    pub fn is_valid_confirmation(&self) -> bool {
        let accepted_status = matches!(
            self.status.as_str(),
            provider_status::CONFIRMED | provider_status::PENDING
        );
        let downstream_failed = self
            .data
            .get("downstream_fail")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        accepted_status && !downstream_failed
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// No answer within the call budget
    #[error("provider timed out: {0}")]
    Timeout(String),

    /// Provider reachable in principle but failing (connection refused, 5xx)
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Provider answered and refused the payload
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// Timeouts and unavailability are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

#[async_trait]
pub trait DownstreamProvider: Send + Sync {
    async fn schedule(
        &self,
        payload: &Value,
        timeout: Duration,
    ) -> Result<ProviderReply, ProviderError>;

    async fn cancel(&self, payload: &Value, timeout: Duration)
        -> Result<ProviderReply, ProviderError>;
}
