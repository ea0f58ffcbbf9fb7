//! # System Constants
//!
//! Wire-level enums and numeric boundaries shared by the routing engine, the
//! resilience layer and the response types.

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export state types for convenience
pub use crate::state_machine::RequestState;

/// Error codes surfaced to callers in `RouteResponse.error.code`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    NodeNotFound,
    EmptyGraph,
    NoPathFound,
    NegativeCycleDetected,
    InvalidGraph,
    ComputationTimeout,
    CircuitBreakerOpen,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::NodeNotFound => "NODE_NOT_FOUND",
            Self::EmptyGraph => "EMPTY_GRAPH",
            Self::NoPathFound => "NO_PATH_FOUND",
            Self::NegativeCycleDetected => "NEGATIVE_CYCLE_DETECTED",
            Self::InvalidGraph => "INVALID_GRAPH",
            Self::ComputationTimeout => "COMPUTATION_TIMEOUT",
            Self::CircuitBreakerOpen => "CIRCUIT_BREAKER_OPEN",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level outcome of a route request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
    Timeout,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Numeric boundaries of the routing engine
pub mod system {
    /// Allowed absolute difference between a claimed and a recomputed path cost
    pub const COST_TOLERANCE: f64 = 1e-6;

    /// Crate version reported in logs
    pub const ROUTE_ORCHESTRATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Circuit breaker component guarding the downstream provider
    pub const EXTERNAL_PROVIDER_COMPONENT: &str = "external_provider";

    /// Circuit breaker component guarding graph loading
    pub const GRAPH_LOADER_COMPONENT: &str = "graph_loader";
}

/// Provider reply statuses understood by the outbox dispatcher
pub mod provider_status {
    pub const CONFIRMED: &str = "CONFIRMED";
    pub const PENDING: &str = "PENDING";
    pub const CANCELLED: &str = "CANCELLED";
}
