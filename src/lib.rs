#![allow(clippy::doc_markdown)] // Allow technical terms like BellmanFord in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Route Orchestrator
//!
//! Shortest-path computation over directed weighted graphs, wrapped in the
//! machinery a production caller needs around it.
//!
//! ## Overview
//!
//! Every request is fingerprinted, deduplicated through an LRU/TTL
//! idempotency cache, and computed under a deadline by the algorithm the
//! graph calls for: Dijkstra for non-negative weights, Bellman-Ford (with
//! negative-cycle detection) otherwise. Each result is re-validated against
//! the graph before it is cached or returned. Successful routes owe a side
//! effect to a downstream provider; that side effect goes through a
//! transactional outbox, a circuit breaker and retry with backoff, and a
//! confirmation that later proves invalid is undone by compensation.
//!
//! ## Module Organization
//!
//! - [`graph`] - Graph model and loaders
//! - [`algorithms`] - Dijkstra, Bellman-Ford, selection and result validation
//! - [`cache`] - Request fingerprints and the idempotency cache
//! - [`resilience`] - Circuit breakers, retry, timeouts and their composition
//! - [`state_machine`] - Per-request lifecycle state machines
//! - [`outbox`] - Transactional outbox, provider contract and dispatcher
//! - [`orchestration`] - Wire types, error classification and the orchestrator
//! - [`config`] - Configuration sections and loading
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use route_orchestrator::config::OrchestratorConfig;
//! use route_orchestrator::graph::Graph;
//! use route_orchestrator::orchestration::{RouteOrchestrator, RouteRequest};
//! use route_orchestrator::outbox::DownstreamProvider;
//! use std::sync::Arc;
//!
//! # async fn example(provider: Arc<dyn DownstreamProvider>) -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = RouteOrchestrator::new(OrchestratorConfig::default(), provider)?;
//! let graph = Arc::new(Graph::from_edges([("A", "B", 5.0), ("A", "C", 2.0), ("C", "B", 1.0)])?);
//!
//! let response = orchestrator.route(RouteRequest::new("req-1", "A", "B"), graph).await;
//! assert_eq!(response.path, Some(vec!["A".into(), "C".into(), "B".into()]));
//!
//! // Deliver the owed side effect
//! orchestrator.dispatch_outbox().await;
//! # Ok(())
//! # }
//! ```

pub mod algorithms;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod graph;
pub mod logging;
pub mod metrics;
pub mod orchestration;
pub mod outbox;
pub mod resilience;
pub mod state_machine;

pub use algorithms::{Algorithm, AlgorithmHint, PathResult};
pub use config::{ConfigManager, OrchestratorConfig};
pub use constants::{ErrorCode, ResponseStatus};
pub use error::{ErrorCategory, Result, RouteError};
pub use graph::{Graph, GraphInput};
pub use metrics::{MetricsSnapshot, RouteMetrics};
pub use orchestration::{RouteOrchestrator, RouteRequest, RouteResponse};
pub use outbox::{DownstreamProvider, ProviderError, ProviderReply};
pub use state_machine::RequestState;
