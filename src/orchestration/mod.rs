//! # Orchestration Module
//!
//! Request lifecycle control: the caller-facing wire types, the error
//! classifier that decides retry versus terminal versus compensate, and the
//! [`RouteOrchestrator`] service that ties the engine together.

pub mod error_classifier;
pub mod route_orchestrator;
pub mod types;

pub use error_classifier::{
    ErrorClassification, ErrorClassifier, ErrorClassifierConfig, FailurePhase, RecoveryDecision,
    StandardErrorClassifier,
};
pub use route_orchestrator::{RetentionReport, RouteOrchestrator};
pub use types::{ErrorBody, ResponseMetadata, RouteRequest, RouteResponse};
