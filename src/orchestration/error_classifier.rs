//! # Error Classification
//!
//! The single place that turns a typed [`RouteError`] into a recovery
//! decision. Algorithms, the cache and the resilience primitives only raise
//! errors; the orchestrator and the outbox dispatcher ask the classifier
//! what to do with them.
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ RouteError      │────▶│ ErrorClassifier │────▶│ Classification  │
//! │ + FailurePhase  │     │ Strategy        │     │ (decision)      │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use route_orchestrator::error::RouteError;
//! use route_orchestrator::orchestration::{
//!     ErrorClassifier, FailurePhase, RecoveryDecision, StandardErrorClassifier,
//! };
//!
//! let classifier = StandardErrorClassifier::new();
//! let error = RouteError::NodeNotFound { node: "Z".into() };
//!
//! let classification = classifier.classify_error(&error, FailurePhase::Computation);
//! assert_eq!(classification.decision, RecoveryDecision::Terminal);
//! ```

use crate::constants::ErrorCode;
use crate::error::{ErrorCategory, RouteError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the request lifecycle the error surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePhase {
    /// Graph loading, algorithm run, result validation
    Computation,
    /// Delivering a scheduled route downstream
    Delivery,
    /// Delivering a compensating cancellation
    Compensation,
}

/// What the caller of the classifier should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryDecision {
    /// Failure is transient; the same key may compute again
    Retry,
    /// Failure is final for this request
    Terminal,
    /// A side effect must be undone
    Compensate,
    /// Leave the work pending and try again later
    Defer,
}

impl fmt::Display for RecoveryDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "retry"),
            Self::Terminal => write!(f, "terminal"),
            Self::Compensate => write!(f, "compensate"),
            Self::Defer => write!(f, "defer"),
        }
    }
}

/// Result of error classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub decision: RecoveryDecision,
    pub code: ErrorCode,
    /// Whether the outcome may be stored under the request fingerprint
    pub cacheable: bool,
}

impl ErrorClassification {
    pub fn is_terminal(&self) -> bool {
        self.decision == RecoveryDecision::Terminal
    }
}

/// Strategy interface for error classification
pub trait ErrorClassifier: Send + Sync {
    fn classify_error(&self, error: &RouteError, phase: FailurePhase) -> ErrorClassification;

    fn classifier_name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassifierConfig {
    /// Store input and algorithmic failures in the idempotency cache
    pub cache_terminal_errors: bool,
}

impl Default for ErrorClassifierConfig {
    fn default() -> Self {
        Self {
            cache_terminal_errors: true,
        }
    }
}

/// Category-driven classifier
///
/// | category    | computation | delivery   | compensation |
/// |-------------|-------------|------------|--------------|
/// | input       | terminal    | compensate | terminal     |
/// | algorithmic | terminal    | compensate | terminal     |
/// | transient   | retry       | compensate | terminal     |
/// | protective  | terminal    | defer      | defer        |
/// | internal    | terminal    | compensate | terminal     |
#[derive(Debug, Clone, Default)]
pub struct StandardErrorClassifier {
    config: ErrorClassifierConfig,
}

impl StandardErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ErrorClassifierConfig) -> Self {
        Self { config }
    }

    fn decide(category: ErrorCategory, phase: FailurePhase) -> RecoveryDecision {
        match (phase, category) {
            (FailurePhase::Delivery | FailurePhase::Compensation, ErrorCategory::Protective) => {
                RecoveryDecision::Defer
            }
            (FailurePhase::Computation, ErrorCategory::Transient) => RecoveryDecision::Retry,
            (FailurePhase::Computation, _) => RecoveryDecision::Terminal,
            (FailurePhase::Delivery, _) => RecoveryDecision::Compensate,
            (FailurePhase::Compensation, _) => RecoveryDecision::Terminal,
        }
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify_error(&self, error: &RouteError, phase: FailurePhase) -> ErrorClassification {
        let category = error.category();
        ErrorClassification {
            category,
            decision: Self::decide(category, phase),
            code: error.code(),
            cacheable: self.config.cache_terminal_errors
                && phase == FailurePhase::Computation
                && category.is_terminal(),
        }
    }

    fn classifier_name(&self) -> &'static str {
        "StandardErrorClassifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::ProviderError;
    use std::time::Duration;

    fn classify(error: RouteError, phase: FailurePhase) -> ErrorClassification {
        StandardErrorClassifier::new().classify_error(&error, phase)
    }

    #[test]
    fn test_computation_phase() {
        let terminal = classify(
            RouteError::NegativeCycleDetected {
                cycle: vec!["A".into(), "A".into()],
                cycle_cost: -1.0,
            },
            FailurePhase::Computation,
        );
        assert_eq!(terminal.decision, RecoveryDecision::Terminal);
        assert_eq!(terminal.category, ErrorCategory::Algorithmic);
        assert!(terminal.cacheable);

        let timeout = classify(
            RouteError::Timeout {
                operation: "path_computation".into(),
                timeout: Duration::from_millis(10),
            },
            FailurePhase::Computation,
        );
        assert_eq!(timeout.decision, RecoveryDecision::Retry);
        assert!(!timeout.cacheable);

        let internal = classify(
            RouteError::ResultValidation("cost mismatch".into()),
            FailurePhase::Computation,
        );
        assert_eq!(internal.decision, RecoveryDecision::Terminal);
        assert_eq!(internal.code, ErrorCode::InternalError);
        assert!(!internal.cacheable);
    }

    #[test]
    fn test_open_circuit_defers_delivery() {
        let open = RouteError::CircuitOpen {
            component: "external_provider".into(),
        };
        assert_eq!(
            classify(open.clone(), FailurePhase::Delivery).decision,
            RecoveryDecision::Defer
        );
        assert_eq!(
            classify(open.clone(), FailurePhase::Compensation).decision,
            RecoveryDecision::Defer
        );
        assert_eq!(
            classify(open, FailurePhase::Computation).decision,
            RecoveryDecision::Terminal
        );
    }

    #[test]
    fn test_delivery_failures_compensate() {
        let rejected = RouteError::Provider(ProviderError::Rejected("400".into()));
        assert_eq!(
            classify(rejected.clone(), FailurePhase::Delivery).decision,
            RecoveryDecision::Compensate
        );
        assert_eq!(
            classify(rejected, FailurePhase::Compensation).decision,
            RecoveryDecision::Terminal
        );
    }

    #[test]
    fn test_error_caching_can_be_disabled() {
        let classifier = StandardErrorClassifier::with_config(ErrorClassifierConfig {
            cache_terminal_errors: false,
        });
        let classification =
            classifier.classify_error(&RouteError::EmptyGraph, FailurePhase::Computation);
        assert!(classification.is_terminal());
        assert!(!classification.cacheable);
    }
}
