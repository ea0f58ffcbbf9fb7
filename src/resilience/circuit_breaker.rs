//! # Circuit Breaker Implementation
//!
//! Fault isolation for a single downstream dependency. Three states:
//! Closed (pass-through, counting consecutive failures), Open (fail fast for
//! the configured cool-down) and Half-Open (exactly one trial call after the
//! cool-down elapses).
//!
//! State, the opened timestamp, the trial flag and metrics share one
//! `parking_lot::Mutex`, so the gate check and every transition are atomic.
//! The lock is never held across the protected operation.
//!
//! Every state change starts a new generation. Each admitted call carries the
//! generation it was admitted under, and an outcome reported for an older
//! generation updates the counters but never moves the state. A call whose
//! future is dropped before reporting is abandoned: an abandoned half-open
//! trial reopens the circuit and restarts the cool-down.

use crate::resilience::{CircuitBreakerConfig, CircuitBreakerMetrics};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - a single trial call is allowed through
    HalfOpen = 2,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Errors that can occur during circuit breaker operation
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, rejecting all calls
    #[error("Circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation ran and failed
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    generation: u64,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    metrics: CircuitBreakerMetrics,
}

/// Ticket for one call let through the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Admission {
    generation: u64,
    trial: bool,
}

/// Abandons the admission if the call is dropped before reporting
struct PendingOutcome<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl Drop for PendingOutcome<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.abandon(self.admission);
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    config: CircuitBreakerConfig,

    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout.as_millis() as u64,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                generation: 0,
                opened_at: None,
                trial_in_flight: false,
                metrics: CircuitBreakerMetrics::new(),
            }),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Execute an operation with circuit breaker protection.
    ///
    /// Every `Err` counts as a failure.
    pub async fn call<F, T, E, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(operation, |_| true).await
    }

    /// Execute an operation, counting only errors for which `is_failure`
    /// holds against the breaker. Other errors prove the dependency
    /// answered and are recorded as successes.
    pub async fn call_classified<F, T, E, Fut, C>(
        &self,
        operation: F,
        is_failure: C,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
    {
        let Some(admission) = self.admit() else {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        };
        let mut pending = PendingOutcome {
            breaker: self,
            admission,
            settled: false,
        };

        let start_time = Instant::now();
        let result = operation().await;
        let duration = start_time.elapsed();
        pending.settled = true;

        let succeeded = !matches!(&result, Err(e) if is_failure(e));
        self.settle(Some(admission), succeeded, duration);

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    /// Gate check. Returns false when the call must be rejected without
    /// dispatch. A true result in the half-open state claims the single
    /// trial slot, which the next `record_*` call releases.
    pub fn try_acquire(&self) -> bool {
        self.admit().is_some()
    }

    fn admit(&self) -> Option<Admission> {
        let mut inner = self.inner.lock();
        let admission = match inner.state {
            CircuitState::Closed => Some(Admission {
                generation: inner.generation,
                trial: false,
            }),
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map_or(true, |opened| opened.elapsed() >= self.config.reset_timeout);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.generation += 1;
                    inner.trial_in_flight = true;
                    info!(
                        component = %self.name,
                        "🟡 Circuit breaker half-open (trial call permitted)"
                    );
                    Some(Admission {
                        generation: inner.generation,
                        trial: true,
                    })
                } else {
                    None
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    None
                } else {
                    inner.trial_in_flight = true;
                    Some(Admission {
                        generation: inner.generation,
                        trial: true,
                    })
                }
            }
        };

        if admission.is_none() {
            inner.metrics.rejected_calls += 1;
            debug!(component = %self.name, state = %inner.state, "⛔ Call rejected by circuit breaker");
        }
        admission
    }

    /// Record a successful operation
    pub fn record_success(&self, duration: Duration) {
        self.settle(None, true, duration);
    }

    /// Record a failed operation
    pub fn record_failure(&self, duration: Duration) {
        self.settle(None, false, duration);
    }

    /// Apply an outcome. `None` means the current generation.
    fn settle(&self, admission: Option<Admission>, succeeded: bool, duration: Duration) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.total_duration += duration;
        if succeeded {
            inner.metrics.success_count += 1;
        } else {
            inner.metrics.failure_count += 1;
        }

        let current = inner.generation;
        if admission.is_some_and(|a| a.generation != current) {
            debug!(
                component = %self.name,
                succeeded,
                state = %inner.state,
                "Outcome from an earlier breaker generation ignored"
            );
            return;
        }

        if succeeded {
            inner.metrics.consecutive_failures = 0;
            debug!(
                component = %self.name,
                duration_ms = duration.as_millis() as u64,
                "🟢 Operation succeeded"
            );
            match inner.state {
                CircuitState::HalfOpen => self.close(&mut inner),
                CircuitState::Closed | CircuitState::Open => {}
            }
            return;
        }

        inner.metrics.consecutive_failures += 1;
        warn!(
            component = %self.name,
            duration_ms = duration.as_millis() as u64,
            consecutive_failures = inner.metrics.consecutive_failures,
            "🔴 Operation failed"
        );
        match inner.state {
            CircuitState::Closed => {
                if inner.metrics.consecutive_failures >= u64::from(self.config.failure_threshold) {
                    self.open(&mut inner);
                }
            }
            // Any failure in half-open state reopens and restarts the cool-down
            CircuitState::HalfOpen => self.open(&mut inner),
            CircuitState::Open => {}
        }
    }

    /// A call was dropped before it reported an outcome
    fn abandon(&self, admission: Admission) {
        let mut inner = self.inner.lock();
        let live_trial = admission.trial
            && admission.generation == inner.generation
            && inner.state == CircuitState::HalfOpen;
        if live_trial {
            warn!(component = %self.name, "Half-open trial abandoned before completing");
            self.open(&mut inner);
        }
    }

    fn close(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Closed;
        inner.generation += 1;
        inner.opened_at = None;
        inner.trial_in_flight = false;
        inner.metrics.consecutive_failures = 0;

        info!(
            component = %self.name,
            total_calls = inner.metrics.total_calls,
            "🟢 Circuit breaker closed (recovered)"
        );
    }

    fn open(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.generation += 1;
        inner.opened_at = Some(Instant::now());
        inner.trial_in_flight = false;

        error!(
            component = %self.name,
            consecutive_failures = inner.metrics.consecutive_failures,
            failure_threshold = self.config.failure_threshold,
            reset_timeout_ms = self.config.reset_timeout.as_millis() as u64,
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        let mut inner = self.inner.lock();
        self.open(&mut inner);
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        let mut inner = self.inner.lock();
        self.close(&mut inner);
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        inner.metrics.clone().with_derived(inner.state)
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}
