//! # Outbox Dispatcher
//!
//! Drains pending outbox events into the downstream provider through the
//! resilience controller. Each pass claims a batch, delivers it, and
//! settles every claimed event as delivered, released (circuit open) or
//! dead-lettered. A schedule that fails terminally, or whose confirmation
//! proves invalid, starts compensation: the request moves to COMPENSATING
//! and a `CancelRoute` event is enqueued for a later pass.

use super::{
    DownstreamProvider, OutboxEvent, OutboxEventType, ProviderReply, TransactionalOutbox,
};
use crate::config::OrchestratorConfig;
use crate::constants::{provider_status, system::EXTERNAL_PROVIDER_COMPONENT};
use crate::error::{Result, RouteError};
use crate::logging::{log_outbox_operation, log_state_transition};
use crate::metrics::RouteMetrics;
use crate::orchestration::{
    ErrorClassifier, FailurePhase, RecoveryDecision, StandardErrorClassifier,
};
use crate::resilience::ResilienceController;
use crate::state_machine::{RequestEvent, StateMachineRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome counts of one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub claimed: usize,
    pub delivered: usize,
    pub dead_lettered: usize,
    /// Released back to pending because the provider circuit was open
    pub deferred: usize,
    pub compensations_started: usize,
    pub compensations_completed: usize,
    pub compensations_failed: usize,
}

impl DispatchReport {
    pub fn is_idle(&self) -> bool {
        self.claimed == 0
    }
}

pub struct OutboxDispatcher {
    outbox: Arc<TransactionalOutbox>,
    provider: Arc<dyn DownstreamProvider>,
    controller: ResilienceController,
    registry: Arc<StateMachineRegistry>,
    metrics: Arc<RouteMetrics>,
    classifier: Arc<dyn ErrorClassifier>,
    schedule_timeout: Duration,
    cancel_timeout: Duration,
    batch_size: usize,
}

impl std::fmt::Debug for OutboxDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboxDispatcher")
            .field("classifier", &self.classifier.classifier_name())
            .field("schedule_timeout", &self.schedule_timeout)
            .field("cancel_timeout", &self.cancel_timeout)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl OutboxDispatcher {
    pub fn new(
        outbox: Arc<TransactionalOutbox>,
        provider: Arc<dyn DownstreamProvider>,
        controller: ResilienceController,
        registry: Arc<StateMachineRegistry>,
        metrics: Arc<RouteMetrics>,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            outbox,
            provider,
            controller,
            registry,
            metrics,
            classifier: Arc::new(StandardErrorClassifier::new()),
            schedule_timeout: config.timeouts.schedule(),
            cancel_timeout: config.timeouts.cancel(),
            batch_size: config.outbox.dispatch_batch_size,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Deliver up to one batch of pending events
    pub async fn dispatch_pending(&self) -> DispatchReport {
        let claimed = self.outbox.claim_pending(self.batch_size);
        let mut report = DispatchReport {
            claimed: claimed.len(),
            ..DispatchReport::default()
        };

        for event in &claimed {
            match event.event_type {
                OutboxEventType::ScheduleRoute => self.deliver_schedule(event, &mut report).await,
                OutboxEventType::CancelRoute => self.deliver_cancel(event, &mut report).await,
            }
        }

        if !report.is_idle() {
            info!(
                claimed = report.claimed,
                delivered = report.delivered,
                dead_lettered = report.dead_lettered,
                deferred = report.deferred,
                compensations_started = report.compensations_started,
                "📬 Outbox dispatch pass complete"
            );
        }
        report
    }

    async fn call_provider(&self, event: &OutboxEvent) -> Result<ProviderReply> {
        let event_type = event.event_type;
        let timeout = match event_type {
            OutboxEventType::ScheduleRoute => self.schedule_timeout,
            OutboxEventType::CancelRoute => self.cancel_timeout,
        };
        let provider = &self.provider;
        let payload = &event.payload;

        self.controller
            .execute(EXTERNAL_PROVIDER_COMPONENT, timeout, || {
                let provider = Arc::clone(provider);
                let payload = payload.clone();
                async move {
                    let reply = match event_type {
                        OutboxEventType::ScheduleRoute => provider.schedule(&payload, timeout).await,
                        OutboxEventType::CancelRoute => provider.cancel(&payload, timeout).await,
                    };
                    reply.map_err(RouteError::from)
                }
            })
            .await
    }

    async fn deliver_schedule(&self, event: &OutboxEvent, report: &mut DispatchReport) {
        match self.call_provider(event).await {
            Ok(reply) => {
                let valid = reply.is_valid_confirmation();
                self.settle_delivered(event, &reply, report);
                if !valid {
                    let reason = format!("invalid confirmation (status {})", reply.status);
                    self.start_compensation(event, &reason, report);
                }
            }
            Err(error) => {
                let classification = self
                    .classifier
                    .classify_error(&error, FailurePhase::Delivery);
                match classification.decision {
                    RecoveryDecision::Defer => self.defer(event, &error, report),
                    _ => {
                        self.settle_dead_letter(event, &error.to_string(), report);
                        self.start_compensation(event, &error.to_string(), report);
                    }
                }
            }
        }
    }

    async fn deliver_cancel(&self, event: &OutboxEvent, report: &mut DispatchReport) {
        match self.call_provider(event).await {
            Ok(reply) if reply.status == provider_status::CANCELLED => {
                self.settle_delivered(event, &reply, report);
                self.finish_compensation(&event.request_id, RequestEvent::CompensationSucceeded);
                report.compensations_completed += 1;
            }
            Ok(reply) => {
                let reason = format!("unexpected cancellation status {}", reply.status);
                self.settle_dead_letter(event, &reason, report);
                self.finish_compensation(&event.request_id, RequestEvent::CompensationFailed(reason));
                report.compensations_failed += 1;
            }
            Err(error) => {
                let classification = self
                    .classifier
                    .classify_error(&error, FailurePhase::Compensation);
                if classification.decision == RecoveryDecision::Defer {
                    self.defer(event, &error, report);
                    return;
                }
                let reason = error.to_string();
                self.settle_dead_letter(event, &reason, report);
                self.finish_compensation(&event.request_id, RequestEvent::CompensationFailed(reason));
                report.compensations_failed += 1;
            }
        }
    }

    fn settle_delivered(&self, event: &OutboxEvent, reply: &ProviderReply, report: &mut DispatchReport) {
        let reply_value = serde_json::to_value(reply).unwrap_or(Value::Null);
        match self.outbox.mark_delivered(event.event_id, Some(reply_value)) {
            Ok(()) => {
                self.metrics.record_outbox_delivered();
                report.delivered += 1;
                log_outbox_operation(
                    "deliver",
                    &event.request_id,
                    event.event_type.as_str(),
                    "delivered",
                    Some(&reply.status),
                );
            }
            Err(e) => warn!(event_id = %event.event_id, error = %e, "Could not mark outbox event delivered"),
        }
    }

    fn settle_dead_letter(&self, event: &OutboxEvent, reason: &str, report: &mut DispatchReport) {
        match self.outbox.dead_letter(event.event_id, reason) {
            Ok(()) => {
                self.metrics.record_outbox_dead_lettered();
                report.dead_lettered += 1;
                log_outbox_operation(
                    "deliver",
                    &event.request_id,
                    event.event_type.as_str(),
                    "dead_lettered",
                    Some(reason),
                );
            }
            Err(e) => warn!(event_id = %event.event_id, error = %e, "Could not dead-letter outbox event"),
        }
    }

    fn defer(&self, event: &OutboxEvent, error: &RouteError, report: &mut DispatchReport) {
        if let Err(e) = self.outbox.release(event.event_id) {
            warn!(event_id = %event.event_id, error = %e, "Could not release outbox event");
            return;
        }
        report.deferred += 1;
        debug!(
            event_id = %event.event_id,
            error = %error,
            "Outbox event deferred until the provider circuit closes"
        );
    }

    /// Move the request to COMPENSATING and owe the provider a cancellation
    fn start_compensation(&self, event: &OutboxEvent, reason: &str, report: &mut DispatchReport) {
        let Some(machine) = self.registry.get(&event.request_id) else {
            warn!(request_id = %event.request_id, "No state machine for compensated request");
            return;
        };

        let transitioned = machine.lock().transition(RequestEvent::Compensate);
        if let Err(e) = transitioned {
            warn!(request_id = %event.request_id, error = %e, "Compensation not started");
            return;
        }

        self.metrics.record_compensation();
        report.compensations_started += 1;
        self.outbox.enqueue(
            &event.request_id,
            OutboxEventType::CancelRoute,
            json!({
                "request_id": event.request_id,
                "original_event_id": event.event_id,
                "reason": reason,
                "route": event.payload,
            }),
        );
        info!(
            request_id = %event.request_id,
            reason,
            "↩️ Compensation started"
        );
    }

    fn finish_compensation(&self, request_id: &str, outcome: RequestEvent) {
        let Some(machine) = self.registry.get(request_id) else {
            warn!(request_id, "No state machine for compensated request");
            return;
        };

        let event_type = outcome.event_type();
        let mut sm = machine.lock();
        match sm.transition(outcome) {
            Ok(state) => log_state_transition(
                request_id,
                event_type,
                state,
                sm.elapsed_ms(),
                sm.last_error().map(|code| code.as_str()),
            ),
            Err(e) => warn!(request_id, error = %e, "Compensation outcome not recorded"),
        }
    }
}
