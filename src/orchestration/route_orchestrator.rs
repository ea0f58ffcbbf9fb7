//! # Route Orchestrator
//!
//! The service object that owns every piece of shared state (idempotency
//! cache, breakers, per-key state machines, outbox) and drives a route
//! request through its lifecycle:
//!
//! ```text
//! request ─▶ register key ─▶ replay by key? ─▶ preconditions ─▶ cache hit?
//!                                                                 │ miss
//!                                      fingerprint gate ◀─────────┘
//!                                             │
//!                     select ─▶ compute (deadline) ─▶ validate result
//!                                             │
//!                 SUCCESS: cache + outbox     │     FAILURE: classify
//! ```
//!
//! Locks are scoped to a single state-machine transition or cache call.
//! The only lock held across an await is the per-fingerprint async gate,
//! which serialises identical computations so at most one runs at a time.
//!
//! A request future may be dropped at any await. The gate lease and the
//! in-flight attempt guard both clean up on drop: the gate is released and a
//! machine left in COMPUTING moves to a retryable FAILURE.

use super::{
    ErrorClassifier, ErrorClassifierConfig, FailurePhase, ResponseMetadata, RouteRequest,
    RouteResponse, StandardErrorClassifier,
};
use crate::algorithms::{AlgorithmSelector, ResultValidator};
use crate::cache::{CacheStats, Fingerprint, IdempotencyCache};
use crate::config::OrchestratorConfig;
use crate::constants::system::GRAPH_LOADER_COMPONENT;
use crate::constants::ErrorCode;
use crate::error::{ErrorCategory, Result, RouteError};
use crate::graph::{Graph, GraphLoader};
use crate::logging::{log_error, log_state_transition, mask_identifier};
use crate::metrics::{MetricsSnapshot, RouteMetrics};
use crate::outbox::{
    DispatchReport, DownstreamProvider, OutboxDispatcher, OutboxEventType, TransactionalOutbox,
};
use crate::resilience::{
    run_blocking_with_timeout, CircuitBreakerManager, ResilienceController,
};
use crate::state_machine::{
    RequestEvent, RequestState, RouteStateMachine, SharedStateMachine, StateMachineRegistry,
};
use dashmap::DashMap;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{debug, info, warn};

const COMPUTATION_OPERATION: &str = "path_computation";

/// What one retention pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub request_machines: usize,
    pub outbox_events: usize,
}

pub struct RouteOrchestrator {
    config: OrchestratorConfig,
    cache: IdempotencyCache<RouteResponse>,
    registry: Arc<StateMachineRegistry>,
    outbox: Arc<TransactionalOutbox>,
    breakers: Arc<CircuitBreakerManager>,
    controller: ResilienceController,
    dispatcher: OutboxDispatcher,
    metrics: Arc<RouteMetrics>,
    classifier: Arc<dyn ErrorClassifier>,
    /// Single-flight gates, one per fingerprint with a computation pending
    gates: DashMap<Fingerprint, Arc<AsyncMutex<()>>>,
}

impl std::fmt::Debug for RouteOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteOrchestrator")
            .field("config", &self.config)
            .field("tracked_requests", &self.registry.len())
            .field("outbox_events", &self.outbox.len())
            .finish()
    }
}

impl RouteOrchestrator {
    /// Build the orchestrator and all of its owned state
    pub fn new(config: OrchestratorConfig, provider: Arc<dyn DownstreamProvider>) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(RouteMetrics::new());
        let breakers = Arc::new(CircuitBreakerManager::new(config.to_breaker_config()));
        let controller = ResilienceController::new(
            config.to_retry_policy(),
            Arc::clone(&breakers),
            Arc::clone(&metrics),
        );
        let registry = Arc::new(StateMachineRegistry::new());
        let outbox = Arc::new(TransactionalOutbox::new());
        let classifier: Arc<dyn ErrorClassifier> =
            Arc::new(StandardErrorClassifier::with_config(ErrorClassifierConfig {
                cache_terminal_errors: config.cache.cache_terminal_errors,
            }));
        let dispatcher = OutboxDispatcher::new(
            Arc::clone(&outbox),
            provider,
            controller.clone(),
            Arc::clone(&registry),
            Arc::clone(&metrics),
            &config,
        )
        .with_classifier(Arc::clone(&classifier));

        info!(
            cache_entries = config.cache.max_entries,
            cache_ttl_seconds = config.cache.ttl_seconds,
            retry_attempts = config.retry.max_attempts,
            failure_threshold = config.circuit_breaker.failure_threshold,
            "🚀 Route orchestrator initialized"
        );

        Ok(Self {
            cache: IdempotencyCache::new(config.cache.max_entries, config.cache.ttl()),
            config,
            registry,
            outbox,
            breakers,
            controller,
            dispatcher,
            metrics,
            classifier,
            gates: DashMap::new(),
        })
    }

    /// Answer a route request against an in-memory graph.
    ///
    /// Never fails: every error becomes an error response.
    pub async fn route(&self, request: RouteRequest, graph: Arc<Graph>) -> RouteResponse {
        self.metrics.record_request();
        let response = self.process(request, graph).await;
        if response.is_success() {
            self.metrics.record_success();
        } else {
            self.metrics.record_error();
        }
        response
    }

    /// Load the graph through the resilience stack, then route
    pub async fn route_with_loader(
        &self,
        request: RouteRequest,
        loader: &dyn GraphLoader,
    ) -> RouteResponse {
        let loaded = self
            .controller
            .execute(GRAPH_LOADER_COMPONENT, self.config.timeouts.graph_load(), || {
                loader.load()
            })
            .await;

        match loaded {
            Ok(graph) => self.route(request, Arc::new(graph)).await,
            Err(error) => {
                self.metrics.record_request();
                self.metrics.record_error();
                warn!(
                    request_id = %mask_identifier(&request.request_id),
                    source = %loader.source_name(),
                    error = %error,
                    "Graph could not be loaded"
                );
                RouteResponse::failure(&request.request_id, &error, ResponseMetadata::default())
            }
        }
    }

    /// Deliver one batch of pending outbox events
    pub async fn dispatch_outbox(&self) -> DispatchReport {
        self.dispatcher.dispatch_pending().await
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn outbox(&self) -> &Arc<TransactionalOutbox> {
        &self.outbox
    }

    pub fn registry(&self) -> &Arc<StateMachineRegistry> {
        &self.registry
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.breakers
    }

    pub fn request_state(&self, request_id: &str) -> Option<RequestState> {
        self.registry.state_of(request_id)
    }

    /// Drop expired cache entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    /// Drop settled state machines and outbox events idle past
    /// `retention.settled_seconds`. A request with an undelivered outbox
    /// event keeps its machine so compensation can still find it.
    pub fn purge_settled(&self) -> RetentionReport {
        let window = chrono::Duration::from_std(self.config.retention.settled_window()).ok();
        let Some(cutoff) = window.and_then(|window| Utc::now().checked_sub_signed(window)) else {
            return RetentionReport::default();
        };

        let report = RetentionReport {
            outbox_events: self.outbox.purge_settled(cutoff),
            request_machines: self
                .registry
                .purge_settled(cutoff, |key| self.outbox.has_unsettled(key)),
        };
        if report != RetentionReport::default() {
            info!(
                request_machines = report.request_machines,
                outbox_events = report.outbox_events,
                "🧹 Retention pass complete"
            );
        }
        report
    }

    async fn process(&self, request: RouteRequest, graph: Arc<Graph>) -> RouteResponse {
        let metadata = ResponseMetadata {
            graph_nodes: graph.node_count(),
            graph_edges: graph.edge_count(),
            ..ResponseMetadata::default()
        };

        if request.request_id.trim().is_empty() {
            let error = RouteError::InvalidRequest("request_id must not be empty".to_string());
            return RouteResponse::failure(&request.request_id, &error, metadata);
        }

        let fingerprint = Fingerprint::compute(
            &graph.content_hash(),
            &request.start,
            &request.goal,
            request.algorithm_hint,
        );

        let machine = match self.registry.register(&request.request_id, &fingerprint) {
            Ok(registration) => Arc::clone(registration.machine()),
            Err(error) => {
                warn!(
                    request_id = %mask_identifier(&request.request_id),
                    fingerprint = %fingerprint.short(),
                    "Idempotency key reused with different inputs"
                );
                return RouteResponse::failure(&request.request_id, &error, metadata);
            }
        };

        let precondition = if graph.is_empty() {
            Err(RouteError::EmptyGraph)
        } else {
            request.validate()
        };
        if let Err(error) = precondition {
            if let Some(replay) = self.replay_by_key(&machine, &request.request_id) {
                return replay;
            }
            return self.settle_failure(&request, &machine, &fingerprint, error, metadata, false);
        }

        if let Some(settled) = self.lookup_settled(&request, &machine, &fingerprint) {
            return settled;
        }

        let lease = GateLease::acquire(self, &fingerprint);
        let _permit = lease.lock().await;
        match self.lookup_settled(&request, &machine, &fingerprint) {
            Some(settled) => settled,
            None => {
                self.compute(&request, &machine, &fingerprint, graph, metadata)
                    .await
            }
        }
    }

    /// A response already owed to this key or to this fingerprint
    fn lookup_settled(
        &self,
        request: &RouteRequest,
        machine: &SharedStateMachine,
        fingerprint: &Fingerprint,
    ) -> Option<RouteResponse> {
        if let Some(replay) = self.replay_by_key(machine, &request.request_id) {
            return Some(replay);
        }
        let cached = self.cache.get(fingerprint)?;
        Some(self.serve_cached(request, machine, cached))
    }

    fn replay_by_key(&self, machine: &SharedStateMachine, request_id: &str) -> Option<RouteResponse> {
        let replay = machine.lock().response()?.replayed_for(request_id);
        self.metrics.record_cache_hit();
        debug!(
            request_id = %mask_identifier(request_id),
            "Replaying recorded response for idempotency key"
        );
        Some(replay)
    }

    /// Serve a cached outcome, bringing this key's machine to the same end
    fn serve_cached(
        &self,
        request: &RouteRequest,
        machine: &SharedStateMachine,
        cached: RouteResponse,
    ) -> RouteResponse {
        self.metrics.record_cache_hit();
        let response = cached.replayed_for(&request.request_id);

        let event = match response.error_code() {
            None => RequestEvent::Complete,
            Some(code) => RequestEvent::fail(code, true),
        };
        let mut sm = machine.lock();
        let settled = Self::enter_computing(&mut sm).and_then(|()| {
            let event_type = event.event_type();
            let state = sm.transition(event)?;
            Ok((event_type, state))
        });
        match settled {
            Ok((event_type, state)) => {
                sm.record_response(response.clone());
                log_state_transition(
                    &request.request_id,
                    event_type,
                    state,
                    sm.elapsed_ms(),
                    response.error_code().map(|code| code.as_str()),
                );
            }
            Err(error) => warn!(
                request_id = %mask_identifier(&request.request_id),
                error = %error,
                "Cached response served without a state transition"
            ),
        }
        response
    }

    async fn compute(
        &self,
        request: &RouteRequest,
        machine: &SharedStateMachine,
        fingerprint: &Fingerprint,
        graph: Arc<Graph>,
        mut metadata: ResponseMetadata,
    ) -> RouteResponse {
        let entered = Self::enter_computing(&mut machine.lock());
        if let Err(error) = entered {
            warn!(
                request_id = %mask_identifier(&request.request_id),
                error = %error,
                "Request cannot enter computation"
            );
            return RouteResponse::failure(&request.request_id, &error, metadata);
        }

        self.metrics.record_cache_miss();
        self.metrics.record_attempt();

        let algorithm = AlgorithmSelector::select(&graph, request.algorithm_hint);
        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.config.timeouts.default_computation());
        let start = request.start.clone();
        let goal = request.goal.clone();

        debug!(
            request_id = %mask_identifier(&request.request_id),
            fingerprint = %fingerprint.short(),
            algorithm = %algorithm,
            timeout_ms = timeout.as_millis() as u64,
            "🧭 Computing route"
        );

        let started = Instant::now();
        let mut in_flight = InFlightAttempt::arm(machine, &request.request_id);
        let outcome = run_blocking_with_timeout(COMPUTATION_OPERATION, timeout, move || {
            let result = algorithm.find_path(&graph, &start, &goal)?;
            ResultValidator::validate_result(&graph, &result)?;
            Ok(result)
        })
        .await;
        in_flight.disarm();
        metadata.computation_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(result) => {
                let response = RouteResponse::success(&request.request_id, result, metadata);
                self.settle_success(request, machine, fingerprint, response)
            }
            Err(error) => self.settle_failure(request, machine, fingerprint, error, metadata, true),
        }
    }

    fn settle_success(
        &self,
        request: &RouteRequest,
        machine: &SharedStateMachine,
        fingerprint: &Fingerprint,
        response: RouteResponse,
    ) -> RouteResponse {
        {
            let mut sm = machine.lock();
            match sm.transition(RequestEvent::Complete) {
                Ok(state) => {
                    sm.record_response(response.clone());
                    log_state_transition(
                        &request.request_id,
                        RequestEvent::Complete.event_type(),
                        state,
                        sm.elapsed_ms(),
                        None,
                    );
                }
                Err(error) => warn!(error = %error, "Success not recorded on state machine"),
            }
        }

        self.cache.put(fingerprint.clone(), response.clone());
        self.outbox.enqueue(
            &request.request_id,
            OutboxEventType::ScheduleRoute,
            json!({
                "request_id": request.request_id,
                "fingerprint": fingerprint.as_str(),
                "path": response.path,
                "cost": response.cost,
                "algorithm": response.algorithm_used,
            }),
        );

        info!(
            request_id = %mask_identifier(&request.request_id),
            algorithm = ?response.algorithm_used,
            cost = ?response.cost,
            computation_time_ms = response.metadata.computation_time_ms,
            "✅ Route computed"
        );
        response
    }

    fn settle_failure(
        &self,
        request: &RouteRequest,
        machine: &SharedStateMachine,
        fingerprint: &Fingerprint,
        error: RouteError,
        metadata: ResponseMetadata,
        cache_allowed: bool,
    ) -> RouteResponse {
        let classification = self
            .classifier
            .classify_error(&error, FailurePhase::Computation);

        if classification.category == ErrorCategory::Internal {
            log_error(
                "route_orchestrator",
                COMPUTATION_OPERATION,
                &error.to_string(),
                Some(fingerprint.short()),
            );
        }
        if error.is_timeout() {
            self.metrics.record_timeout();
        }

        let response = RouteResponse::failure(&request.request_id, &error, metadata);
        let terminal = classification.is_terminal();
        {
            let mut sm = machine.lock();
            let event = RequestEvent::fail(classification.code, terminal);
            match sm.transition(event) {
                Ok(state) => {
                    if terminal {
                        sm.record_response(response.clone());
                    }
                    log_state_transition(
                        &request.request_id,
                        "fail",
                        state,
                        sm.elapsed_ms(),
                        Some(classification.code.as_str()),
                    );
                }
                Err(transition_error) => warn!(
                    error = %transition_error,
                    "Failure not recorded on state machine"
                ),
            }
        }

        if cache_allowed && classification.cacheable {
            self.cache.put(fingerprint.clone(), response.clone());
        }

        info!(
            request_id = %mask_identifier(&request.request_id),
            code = %classification.code,
            decision = %classification.decision,
            "❌ Route request failed"
        );
        response
    }

    /// Move a machine into COMPUTING from wherever a fresh attempt may start
    fn enter_computing(sm: &mut RouteStateMachine) -> Result<()> {
        match sm.current_state() {
            RequestState::Init => {
                sm.transition(RequestEvent::Validate)?;
                sm.transition(RequestEvent::BeginComputation)?;
            }
            RequestState::Validated => {
                sm.transition(RequestEvent::BeginComputation)?;
            }
            RequestState::Failure => {
                sm.transition(RequestEvent::Retry)?;
            }
            other => {
                return Err(RouteError::InvalidTransition {
                    from: other.to_string(),
                    event: RequestEvent::BeginComputation.event_type().to_string(),
                })
            }
        }
        Ok(())
    }

    fn gate_for(&self, fingerprint: &Fingerprint) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.gates
                .entry(fingerprint.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .value(),
        )
    }

    /// Forget a gate once the map holds its only reference. Clones are taken
    /// under the same shard lock, so the count cannot rise during the check.
    fn release_gate(&self, fingerprint: &Fingerprint) {
        self.gates
            .remove_if(fingerprint, |_, current| Arc::strong_count(current) == 1);
    }

    /// Number of fingerprints with a gate currently registered
    pub fn open_gates(&self) -> usize {
        self.gates.len()
    }
}

/// Reference to a fingerprint gate, released on every exit path including
/// cancellation of the owning request.
struct GateLease<'a> {
    orchestrator: &'a RouteOrchestrator,
    fingerprint: &'a Fingerprint,
    gate: Option<Arc<AsyncMutex<()>>>,
}

impl<'a> GateLease<'a> {
    fn acquire(orchestrator: &'a RouteOrchestrator, fingerprint: &'a Fingerprint) -> Self {
        Self {
            gate: Some(orchestrator.gate_for(fingerprint)),
            orchestrator,
            fingerprint,
        }
    }

    async fn lock(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        }
    }
}

impl Drop for GateLease<'_> {
    fn drop(&mut self) {
        // Our own handle goes first so the count reflects other holders only
        drop(self.gate.take());
        self.orchestrator.release_gate(self.fingerprint);
    }
}

/// Armed while a computation is awaited. If the request future is dropped
/// before the outcome settles, the machine leaves COMPUTING through a
/// retryable failure so the key can be used again.
struct InFlightAttempt<'a> {
    machine: &'a SharedStateMachine,
    request_id: &'a str,
    armed: bool,
}

impl<'a> InFlightAttempt<'a> {
    fn arm(machine: &'a SharedStateMachine, request_id: &'a str) -> Self {
        Self {
            machine,
            request_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightAttempt<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut sm = self.machine.lock();
        if sm.current_state() != RequestState::Computing {
            return;
        }
        match sm.transition(RequestEvent::fail(ErrorCode::ComputationTimeout, false)) {
            Ok(state) => warn!(
                request_id = %mask_identifier(self.request_id),
                state = %state,
                "Route computation abandoned by caller; key left retryable"
            ),
            Err(error) => warn!(
                request_id = %mask_identifier(self.request_id),
                error = %error,
                "Abandoned computation could not be recorded"
            ),
        }
    }
}
