//! # Resilience Module
//!
//! Fault tolerance primitives for calls that leave the process: circuit
//! breakers, retry with exponential backoff and timeout guards, plus the
//! controller that composes them around a unit of work.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use route_orchestrator::resilience::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig {
//!     failure_threshold: 5,
//!     reset_timeout: Duration::from_secs(30),
//! };
//!
//! let circuit_breaker = CircuitBreaker::new("external_provider", config);
//!
//! let result = circuit_breaker.call(|| async {
//!     Ok::<&str, Box<dyn std::error::Error>>("confirmed")
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod controller;
pub mod manager;
pub mod metrics;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use config::CircuitBreakerConfig;
pub use controller::ResilienceController;
pub use manager::CircuitBreakerManager;
pub use metrics::{CircuitBreakerMetrics, SystemCircuitBreakerMetrics};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use timeout::{run_blocking_with_timeout, with_timeout};
