//! # Transactional Outbox
//!
//! In-memory record of side effects owed to the downstream provider. Events
//! survive delivery failures until confirmed; a terminal failure moves them
//! to the dead-letter set with the error preserved. Delivery claims an
//! event (`InFlight`) first, so concurrent dispatchers never deliver the
//! same event twice.
//!
//! Lookups are indexed: duplicate suppression goes through a
//! `(request_id, event_type)` map and claims walk only the pending queue, so
//! neither grows with the number of settled events. Settled events stay
//! visible until [`TransactionalOutbox::purge_settled`] drops those older
//! than the retention window; after that the same `(request_id, event_type)`
//! may be enqueued afresh.

use crate::error::{Result, RouteError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxEventType {
    /// Hand a computed route to the provider
    ScheduleRoute,
    /// Compensating cancellation of a scheduled route
    CancelRoute,
}

impl OutboxEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScheduleRoute => "schedule_route",
            Self::CancelRoute => "cancel_route",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    InFlight,
    Delivered,
    DeadLettered { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub event_id: Uuid,
    pub request_id: String,
    pub event_type: OutboxEventType,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    /// When the event became delivered or dead-lettered
    pub settled_at: Option<DateTime<Utc>>,
    pub status: DeliveryStatus,
    /// Number of dispatch claims so far
    pub attempts: u32,
    /// Provider reply recorded on delivery
    pub reply: Option<Value>,
}

impl OutboxEvent {
    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }

    /// Delivered or dead-lettered
    pub fn is_settled(&self) -> bool {
        matches!(
            self.status,
            DeliveryStatus::Delivered | DeliveryStatus::DeadLettered { .. }
        )
    }
}

#[derive(Debug)]
struct StoredEvent {
    sequence: u64,
    event: OutboxEvent,
}

#[derive(Debug, Default)]
struct OutboxInner {
    events: HashMap<Uuid, StoredEvent>,
    /// Every retained event by enqueue sequence
    order: BTreeMap<u64, Uuid>,
    /// Pending events by enqueue sequence, for FIFO claims
    pending: BTreeMap<u64, Uuid>,
    by_request: HashMap<(String, OutboxEventType), Uuid>,
    next_sequence: u64,
}

impl OutboxInner {
    fn stored_mut(&mut self, event_id: Uuid) -> Result<&mut StoredEvent> {
        self.events
            .get_mut(&event_id)
            .ok_or_else(|| RouteError::Internal(format!("unknown outbox event {event_id}")))
    }

    fn collect(&self, filter: impl Fn(&OutboxEvent) -> bool) -> Vec<OutboxEvent> {
        self.order
            .values()
            .filter_map(|id| self.events.get(id))
            .map(|stored| &stored.event)
            .filter(|event| filter(event))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct TransactionalOutbox {
    inner: Mutex<OutboxInner>,
}

impl TransactionalOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an intended side effect.
    ///
    /// At most one event exists per `(request_id, event_type)`; enqueuing a
    /// duplicate returns the existing event id.
    pub fn enqueue(
        &self,
        request_id: &str,
        event_type: OutboxEventType,
        payload: Value,
    ) -> Uuid {
        let mut inner = self.inner.lock();
        let key = (request_id.to_string(), event_type);

        if let Some(existing) = inner.by_request.get(&key) {
            debug!(
                request_id,
                event_type = event_type.as_str(),
                event_id = %existing,
                "Outbox event already recorded"
            );
            return *existing;
        }

        let event_id = Uuid::new_v4();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.events.insert(
            event_id,
            StoredEvent {
                sequence,
                event: OutboxEvent {
                    event_id,
                    request_id: request_id.to_string(),
                    event_type,
                    payload,
                    enqueued_at: Utc::now(),
                    delivered_at: None,
                    settled_at: None,
                    status: DeliveryStatus::Pending,
                    attempts: 0,
                    reply: None,
                },
            },
        );
        inner.order.insert(sequence, event_id);
        inner.pending.insert(sequence, event_id);
        inner.by_request.insert(key, event_id);

        debug!(
            request_id,
            event_type = event_type.as_str(),
            event_id = %event_id,
            "📬 Outbox event enqueued"
        );
        event_id
    }

    /// Claim up to `limit` pending events in enqueue order
    pub fn claim_pending(&self, limit: usize) -> Vec<OutboxEvent> {
        let mut inner = self.inner.lock();
        let OutboxInner {
            events, pending, ..
        } = &mut *inner;

        let mut claimed = Vec::new();
        while claimed.len() < limit {
            let Some((_, id)) = pending.pop_first() else {
                break;
            };
            if let Some(stored) = events.get_mut(&id) {
                stored.event.status = DeliveryStatus::InFlight;
                stored.event.attempts += 1;
                claimed.push(stored.event.clone());
            }
        }
        claimed
    }

    /// Confirm delivery. Repeating it for a delivered event is a no-op, so a
    /// late duplicate confirmation is harmless.
    pub fn mark_delivered(&self, event_id: Uuid, reply: Option<Value>) -> Result<()> {
        let mut inner = self.inner.lock();
        let stored = inner.stored_mut(event_id)?;
        let sequence = stored.sequence;
        let event = &mut stored.event;
        match event.status {
            DeliveryStatus::Delivered => Ok(()),
            DeliveryStatus::InFlight | DeliveryStatus::Pending => {
                let now = Utc::now();
                event.status = DeliveryStatus::Delivered;
                event.delivered_at = Some(now);
                event.settled_at = Some(now);
                event.reply = reply;
                inner.pending.remove(&sequence);
                Ok(())
            }
            DeliveryStatus::DeadLettered { .. } => {
                warn!(event_id = %event_id, "Delivery confirmed for a dead-lettered event");
                Err(RouteError::Internal(format!(
                    "outbox event {event_id} was already dead-lettered"
                )))
            }
        }
    }

    /// Return a claimed event to the pending set
    pub fn release(&self, event_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock();
        let stored = inner.stored_mut(event_id)?;
        if stored.event.status == DeliveryStatus::InFlight {
            stored.event.status = DeliveryStatus::Pending;
            let sequence = stored.sequence;
            inner.pending.insert(sequence, event_id);
        }
        Ok(())
    }

    /// Remove an event from the pending set, preserving the failure
    pub fn dead_letter(&self, event_id: Uuid, error: impl Into<String>) -> Result<()> {
        let error = error.into();
        let mut inner = self.inner.lock();
        let stored = inner.stored_mut(event_id)?;
        let sequence = stored.sequence;
        let event = &mut stored.event;
        if event.is_delivered() {
            return Err(RouteError::Internal(format!(
                "outbox event {event_id} was already delivered"
            )));
        }
        warn!(
            event_id = %event_id,
            request_id = %event.request_id,
            error = %error,
            "☠️ Outbox event dead-lettered"
        );
        event.status = DeliveryStatus::DeadLettered { error };
        event.settled_at = Some(Utc::now());
        inner.pending.remove(&sequence);
        Ok(())
    }

    /// Drop delivered and dead-lettered events settled before `cutoff`,
    /// returning how many were removed
    pub fn purge_settled(&self, cutoff: DateTime<Utc>) -> usize {
        let mut inner = self.inner.lock();
        let expired: Vec<(u64, Uuid)> = inner
            .events
            .iter()
            .filter(|(_, stored)| {
                stored.event.is_settled()
                    && stored.event.settled_at.is_some_and(|settled| settled < cutoff)
            })
            .map(|(id, stored)| (stored.sequence, *id))
            .collect();

        for (sequence, event_id) in &expired {
            inner.order.remove(sequence);
            if let Some(stored) = inner.events.remove(event_id) {
                let key = (stored.event.request_id, stored.event.event_type);
                inner.by_request.remove(&key);
            }
        }
        if !expired.is_empty() {
            debug!(purged = expired.len(), "🧹 Settled outbox events purged");
        }
        expired.len()
    }

    /// Whether `request_id` still has an event awaiting delivery
    pub fn has_unsettled(&self, request_id: &str) -> bool {
        let inner = self.inner.lock();
        [OutboxEventType::ScheduleRoute, OutboxEventType::CancelRoute]
            .into_iter()
            .filter_map(|event_type| inner.by_request.get(&(request_id.to_string(), event_type)))
            .filter_map(|id| inner.events.get(id))
            .any(|stored| !stored.event.is_settled())
    }

    pub fn get(&self, event_id: Uuid) -> Option<OutboxEvent> {
        self.inner
            .lock()
            .events
            .get(&event_id)
            .map(|stored| stored.event.clone())
    }

    pub fn pending(&self) -> Vec<OutboxEvent> {
        let inner = self.inner.lock();
        inner
            .pending
            .values()
            .filter_map(|id| inner.events.get(id))
            .map(|stored| stored.event.clone())
            .collect()
    }

    pub fn delivered(&self) -> Vec<OutboxEvent> {
        self.inner.lock().collect(OutboxEvent::is_delivered)
    }

    pub fn dead_letters(&self) -> Vec<OutboxEvent> {
        self.inner
            .lock()
            .collect(|e| matches!(e.status, DeliveryStatus::DeadLettered { .. }))
    }

    pub fn events_for_request(&self, request_id: &str) -> Vec<OutboxEvent> {
        let inner = self.inner.lock();
        let mut events: Vec<&StoredEvent> =
            [OutboxEventType::ScheduleRoute, OutboxEventType::CancelRoute]
                .into_iter()
                .filter_map(|event_type| {
                    inner.by_request.get(&(request_id.to_string(), event_type))
                })
                .filter_map(|id| inner.events.get(id))
                .collect();
        events.sort_by_key(|stored| stored.sequence);
        events.into_iter().map(|stored| stored.event.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
