//! Error types for the routing engine.
//!
//! Lower layers raise a typed [`RouteError`]; only the orchestrator inspects
//! [`ErrorCategory`] to decide between retrying, failing terminally or
//! compensating.

use crate::constants::ErrorCode;
use crate::outbox::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Broad error families that drive retry-vs-terminal decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed input, absent nodes, empty graph. Never retried.
    Input,
    /// Negative cycle, no path. Terminal and carries a diagnostic payload.
    Algorithmic,
    /// I/O failures and timeouts. Retried per policy.
    Transient,
    /// Circuit open. Surfaced at once without consuming retry budget.
    Protective,
    /// Bugs and invariant breaches. Logged in full, surfaced generically.
    Internal,
}

impl ErrorCategory {
    /// Terminal categories short-circuit a request straight to FAILURE
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Input | Self::Algorithmic)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Idempotency key '{key}' was already used with different request parameters")]
    IdempotencyConflict { key: String },

    #[error("Graph contains no nodes")]
    EmptyGraph,

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Node '{node}' not found in graph")]
    NodeNotFound { node: String },

    #[error("Dijkstra requires non-negative weights, edge {from} -> {to} has weight {weight}")]
    NegativeWeightRejected {
        from: String,
        to: String,
        weight: f64,
    },

    #[error("No path exists from {start} to {goal}")]
    NoPathFound { start: String, goal: String },

    #[error("Negative cycle detected: {} with cost {cycle_cost}", .cycle.join(" -> "))]
    NegativeCycleDetected { cycle: Vec<String>, cycle_cost: f64 },

    #[error("Graph load failed: {0}")]
    GraphLoad(String),

    #[error("Operation '{operation}' exceeded timeout of {}ms", .timeout.as_millis())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    #[error("Downstream provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Result validation failed: {0}")]
    ResultValidation(String),

    #[error("Invalid state transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RouteError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest(_)
            | Self::IdempotencyConflict { .. }
            | Self::EmptyGraph
            | Self::InvalidGraph(_)
            | Self::NodeNotFound { .. }
            | Self::NegativeWeightRejected { .. } => ErrorCategory::Input,
            Self::NoPathFound { .. } | Self::NegativeCycleDetected { .. } => {
                ErrorCategory::Algorithmic
            }
            Self::GraphLoad(_) | Self::Timeout { .. } => ErrorCategory::Transient,
            Self::Provider(provider_error) => {
                if provider_error.is_retryable() {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Input
                }
            }
            Self::CircuitOpen { .. } => ErrorCategory::Protective,
            Self::ResultValidation(_)
            | Self::InvalidTransition { .. }
            | Self::Configuration(_)
            | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Only transient failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    pub fn is_terminal(&self) -> bool {
        self.category().is_terminal()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Wire error code for this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRequest(_) | Self::IdempotencyConflict { .. } => {
                ErrorCode::InvalidRequest
            }
            Self::EmptyGraph => ErrorCode::EmptyGraph,
            Self::InvalidGraph(_) | Self::NegativeWeightRejected { .. } => ErrorCode::InvalidGraph,
            Self::NodeNotFound { .. } => ErrorCode::NodeNotFound,
            Self::NoPathFound { .. } => ErrorCode::NoPathFound,
            Self::NegativeCycleDetected { .. } => ErrorCode::NegativeCycleDetected,
            Self::Timeout { .. } => ErrorCode::ComputationTimeout,
            Self::CircuitOpen { .. } => ErrorCode::CircuitBreakerOpen,
            Self::GraphLoad(_)
            | Self::Provider(_)
            | Self::ResultValidation(_)
            | Self::InvalidTransition { .. }
            | Self::Configuration(_)
            | Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Caller-facing message; internal detail stays in the logs
    pub fn public_message(&self) -> String {
        match self.category() {
            ErrorCategory::Internal => "An internal error occurred".to_string(),
            _ => match self {
                Self::GraphLoad(_) => "Graph source is unavailable".to_string(),
                Self::Provider(_) => "Downstream provider rejected the request".to_string(),
                other => other.to_string(),
            },
        }
    }

    /// Structured diagnostics attached to the error response
    pub fn details(&self) -> Value {
        match self {
            Self::NegativeCycleDetected { cycle, cycle_cost } => json!({
                "cycle": cycle,
                "cycle_cost": cycle_cost,
            }),
            Self::NodeNotFound { node } => json!({ "node": node }),
            Self::NoPathFound { start, goal } => json!({ "start": start, "goal": goal }),
            Self::NegativeWeightRejected { from, to, weight } => {
                json!({ "source": from, "target": to, "weight": weight })
            }
            Self::Timeout { operation, timeout } => json!({
                "operation": operation,
                "timeout_ms": timeout.as_millis() as u64,
            }),
            Self::CircuitOpen { component } => json!({ "component": component }),
            _ => json!({}),
        }
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(error: serde_json::Error) -> Self {
        RouteError::InvalidGraph(format!("JSON error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, RouteError>;
