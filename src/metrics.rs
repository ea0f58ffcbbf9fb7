//! # Route Metrics
//!
//! Process-local counters for the routing engine. Counters are plain atomics
//! shared through an `Arc`; [`RouteMetrics::snapshot`] produces a serialisable
//! point-in-time copy for whatever exporter the host process wires up.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Default)]
pub struct RouteMetrics {
    requests_total: AtomicU64,
    success_total: AtomicU64,
    error_total: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    attempts_total: AtomicU64,
    retries_total: AtomicU64,
    timeouts_total: AtomicU64,
    provider_timeouts: AtomicU64,
    provider_errors: AtomicU64,
    circuit_rejections: AtomicU64,
    outbox_delivered: AtomicU64,
    outbox_dead_lettered: AtomicU64,
    compensations_total: AtomicU64,
}

/// Point-in-time copy of [`RouteMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub success_total: u64,
    pub error_total: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub attempts_total: u64,
    pub retries_total: u64,
    pub timeouts_total: u64,
    pub provider_timeouts: u64,
    pub provider_errors: u64,
    pub circuit_rejections: u64,
    pub outbox_delivered: u64,
    pub outbox_dead_lettered: u64,
    pub compensations_total: u64,
}

impl MetricsSnapshot {
    /// Fraction of lookups served from cache (0.0 to 1.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / lookups as f64
    }
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl RouteMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_request, requests_total);
    counter!(record_success, success_total);
    counter!(record_error, error_total);
    counter!(record_cache_hit, cache_hits);
    counter!(record_cache_miss, cache_misses);
    counter!(record_attempt, attempts_total);
    counter!(record_retry, retries_total);
    counter!(record_timeout, timeouts_total);
    counter!(record_provider_timeout, provider_timeouts);
    counter!(record_provider_error, provider_errors);
    counter!(record_circuit_rejection, circuit_rejections);
    counter!(record_outbox_delivered, outbox_delivered);
    counter!(record_outbox_dead_lettered, outbox_dead_lettered);
    counter!(record_compensation, compensations_total);

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            requests_total: load(&self.requests_total),
            success_total: load(&self.success_total),
            error_total: load(&self.error_total),
            cache_hits: load(&self.cache_hits),
            cache_misses: load(&self.cache_misses),
            attempts_total: load(&self.attempts_total),
            retries_total: load(&self.retries_total),
            timeouts_total: load(&self.timeouts_total),
            provider_timeouts: load(&self.provider_timeouts),
            provider_errors: load(&self.provider_errors),
            circuit_rejections: load(&self.circuit_rejections),
            outbox_delivered: load(&self.outbox_delivered),
            outbox_dead_lettered: load(&self.outbox_dead_lettered),
            compensations_total: load(&self.compensations_total),
        }
    }

    /// Emit the current counters as a single debug event
    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        debug!(
            requests = snapshot.requests_total,
            success = snapshot.success_total,
            errors = snapshot.error_total,
            cache_hit_rate = snapshot.cache_hit_rate(),
            retries = snapshot.retries_total,
            circuit_rejections = snapshot.circuit_rejections,
            "📊 Route metrics summary"
        );
    }
}
