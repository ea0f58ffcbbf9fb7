//! # Orchestration Types
//!
//! Wire shapes exchanged with callers: the route request, the route response
//! and its error body and metadata.

use crate::algorithms::{Algorithm, AlgorithmHint, PathResult};
use crate::constants::{ErrorCode, ResponseStatus};
use crate::error::{Result, RouteError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to compute a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Idempotency key supplied by the caller
    #[serde(alias = "idempotency_key")]
    pub request_id: String,
    pub start: String,
    pub goal: String,
    #[serde(default)]
    pub algorithm_hint: AlgorithmHint,
    /// Computation budget; the configured default applies when absent
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl RouteRequest {
    pub fn new(
        request_id: impl Into<String>,
        start: impl Into<String>,
        goal: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            start: start.into(),
            goal: goal.into(),
            algorithm_hint: AlgorithmHint::Auto,
            timeout_ms: None,
        }
    }

    pub fn with_hint(mut self, hint: AlgorithmHint) -> Self {
        self.algorithm_hint = hint;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Shape checks that need no graph
    pub fn validate(&self) -> Result<()> {
        if self.request_id.trim().is_empty() {
            return Err(RouteError::InvalidRequest(
                "request_id must not be empty".to_string(),
            ));
        }
        if self.start.is_empty() || self.goal.is_empty() {
            return Err(RouteError::InvalidRequest(
                "start and goal must not be empty".to_string(),
            ));
        }
        if self.start == self.goal {
            return Err(RouteError::InvalidRequest(format!(
                "start and goal are both '{}'",
                self.start
            )));
        }
        if self.timeout_ms == Some(0) {
            return Err(RouteError::InvalidRequest(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Error payload of a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl From<&RouteError> for ErrorBody {
    fn from(error: &RouteError) -> Self {
        Self {
            code: error.code(),
            message: error.public_message(),
            details: error.details(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Served from the idempotency cache or replayed by key
    pub cache_hit: bool,
    pub computation_time_ms: f64,
    pub graph_nodes: usize,
    pub graph_edges: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub request_id: String,
    pub status: ResponseStatus,
    pub path: Option<Vec<String>>,
    pub cost: Option<f64>,
    pub algorithm_used: Option<Algorithm>,
    pub error: Option<ErrorBody>,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

impl RouteResponse {
    pub fn success(
        request_id: impl Into<String>,
        result: PathResult,
        metadata: ResponseMetadata,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            status: ResponseStatus::Success,
            path: Some(result.path),
            cost: Some(result.cost),
            algorithm_used: Some(result.algorithm),
            error: None,
            metadata,
        }
    }

    /// Failed response; a deadline breach reports status `timeout`
    pub fn failure(
        request_id: impl Into<String>,
        error: &RouteError,
        metadata: ResponseMetadata,
    ) -> Self {
        let status = if error.is_timeout() {
            ResponseStatus::Timeout
        } else {
            ResponseStatus::Error
        };
        Self {
            request_id: request_id.into(),
            status,
            path: None,
            cost: None,
            algorithm_used: None,
            error: Some(ErrorBody::from(error)),
            metadata,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|body| body.code)
    }

    /// Copy of a stored response served to `request_id` without recomputation
    pub fn replayed_for(&self, request_id: &str) -> Self {
        let mut replay = self.clone();
        replay.request_id = request_id.to_string();
        replay.metadata.cache_hit = true;
        replay
    }
}
