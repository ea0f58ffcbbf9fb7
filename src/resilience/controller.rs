//! # Resilience Controller
//!
//! Composes the three primitives around one unit of work, innermost first:
//! circuit breaker gate, then a timeout-bounded attempt, then the retry loop
//! around the gated and bounded attempt.
//!
//! Only transient errors count against a breaker; input rejections prove the
//! dependency answered. A `CircuitOpen` rejection is protective and never
//! consumes retry budget.

use super::{
    retry_with_backoff, with_timeout, CircuitBreakerError, CircuitBreakerManager, RetryPolicy,
};
use crate::error::{Result, RouteError};
use crate::metrics::RouteMetrics;
use crate::outbox::ProviderError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ResilienceController {
    retry_policy: RetryPolicy,
    breakers: Arc<CircuitBreakerManager>,
    metrics: Arc<RouteMetrics>,
}

impl ResilienceController {
    pub fn new(
        retry_policy: RetryPolicy,
        breakers: Arc<CircuitBreakerManager>,
        metrics: Arc<RouteMetrics>,
    ) -> Self {
        Self {
            retry_policy,
            breakers,
            metrics,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.breakers
    }

    /// Run `operation` against `component` with the controller's retry policy
    pub async fn execute<T, F, Fut>(
        &self,
        component: &str,
        timeout: Duration,
        operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_policy(&self.retry_policy, component, timeout, operation)
            .await
    }

    pub async fn execute_with_policy<T, F, Fut>(
        &self,
        policy: &RetryPolicy,
        component: &str,
        timeout: Duration,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.breakers.get_circuit_breaker(component).await;

        retry_with_backoff(policy, component, RouteError::is_retryable, |attempt| {
            let attempt_future = operation();
            let breaker = Arc::clone(&breaker);
            let metrics = Arc::clone(&self.metrics);

            async move {
                // Counted only once the breaker lets the call through
                let dispatch = || {
                    metrics.record_attempt();
                    if attempt > 1 {
                        metrics.record_retry();
                    }
                    with_timeout(component, timeout, attempt_future)
                };

                let outcome = breaker
                    .call_classified(dispatch, RouteError::is_retryable)
                    .await;

                match outcome {
                    Ok(value) => Ok(value),
                    Err(CircuitBreakerError::CircuitOpen { component }) => {
                        metrics.record_circuit_rejection();
                        Err(RouteError::CircuitOpen { component })
                    }
                    Err(CircuitBreakerError::OperationFailed(error)) => {
                        record_failure_kind(&metrics, &error);
                        Err(error)
                    }
                }
            }
        })
        .await
    }
}

fn record_failure_kind(metrics: &RouteMetrics, error: &RouteError) {
    match error {
        RouteError::Timeout { .. } => metrics.record_timeout(),
        RouteError::Provider(ProviderError::Timeout(_)) => {
            metrics.record_timeout();
            metrics.record_provider_timeout();
        }
        RouteError::Provider(_) => metrics.record_provider_error(),
        _ => {}
    }
}
