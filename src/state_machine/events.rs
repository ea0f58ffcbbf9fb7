use crate::constants::ErrorCode;
use serde::{Deserialize, Serialize};

/// Events that can trigger request state transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RequestEvent {
    /// Input shape accepted
    Validate,
    /// Graph available and algorithm chosen
    BeginComputation,
    /// Computation produced a validated result
    Complete,
    /// Computation failed; `terminal` failures forbid a later retry
    Fail { code: ErrorCode, terminal: bool },
    /// Fresh attempt with the same idempotency key after a transient failure
    Retry,
    /// A downstream confirmation proved invalid
    Compensate,
    /// Compensating cancellation confirmed
    CompensationSucceeded,
    /// Compensating cancellation failed terminally
    CompensationFailed(String),
}

impl RequestEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::BeginComputation => "begin_computation",
            Self::Complete => "complete",
            Self::Fail { .. } => "fail",
            Self::Retry => "retry",
            Self::Compensate => "compensate",
            Self::CompensationSucceeded => "compensation_succeeded",
            Self::CompensationFailed(_) => "compensation_failed",
        }
    }

    /// Create a failure event
    pub fn fail(code: ErrorCode, terminal: bool) -> Self {
        Self::Fail { code, terminal }
    }

    /// Short description attached to the transition record
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Fail { code, terminal } => Some(format!("{code} (terminal: {terminal})")),
            Self::CompensationFailed(reason) => Some(reason.clone()),
            _ => None,
        }
    }
}
