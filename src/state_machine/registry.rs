//! # State Machine Registry
//!
//! Process-wide map of idempotency key to [`RouteStateMachine`]. Lookup-or-
//! create runs under the map's shard lock through the `DashMap` entry API,
//! so two racing requests with the same key always share one instance.
//! Each instance sits behind its own short-lived `parking_lot::Mutex`; no
//! caller holds it across an await.
//!
//! Settled machines are kept for replay until
//! [`StateMachineRegistry::purge_settled`] drops those idle past the
//! retention window. A purged key registers as new on its next request.

use super::{RequestState, RouteStateMachine};
use chrono::{DateTime, Utc};
use crate::cache::Fingerprint;
use crate::error::{Result, RouteError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub type SharedStateMachine = Arc<Mutex<RouteStateMachine>>;

/// Result of registering a key
#[derive(Debug, Clone)]
pub enum Registration {
    /// First sight of this key
    Created(SharedStateMachine),
    /// Key seen before with the same fingerprint
    Existing(SharedStateMachine),
}

impl Registration {
    pub fn machine(&self) -> &SharedStateMachine {
        match self {
            Self::Created(machine) | Self::Existing(machine) => machine,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Debug, Default)]
pub struct StateMachineRegistry {
    machines: DashMap<String, SharedStateMachine>,
}

impl StateMachineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the machine for `key`, creating it on first sight.
    ///
    /// A key already bound to a different fingerprint is an idempotency
    /// conflict.
    pub fn register(&self, key: &str, fingerprint: &Fingerprint) -> Result<Registration> {
        match self.machines.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                let machine = Arc::clone(occupied.get());
                if machine.lock().fingerprint() != fingerprint {
                    return Err(RouteError::IdempotencyConflict {
                        key: key.to_string(),
                    });
                }
                Ok(Registration::Existing(machine))
            }
            Entry::Vacant(vacant) => {
                let machine = Arc::new(Mutex::new(RouteStateMachine::new(
                    key,
                    fingerprint.clone(),
                )));
                vacant.insert(Arc::clone(&machine));
                debug!(request_id = key, "Registered new request state machine");
                Ok(Registration::Created(machine))
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<SharedStateMachine> {
        self.machines.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn state_of(&self, key: &str) -> Option<RequestState> {
        self.get(key).map(|machine| machine.lock().current_state())
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Drop settled machines whose last transition is older than `cutoff`.
    ///
    /// A machine still referenced elsewhere is in use and stays, as does any
    /// key `retain` vouches for. Returns how many were removed.
    pub fn purge_settled(&self, cutoff: DateTime<Utc>, retain: impl Fn(&str) -> bool) -> usize {
        let before = self.machines.len();
        self.machines.retain(|key, machine| {
            if Arc::strong_count(machine) > 1 {
                return true;
            }
            let expired = {
                let sm = machine.lock();
                sm.current_state().is_settled() && sm.last_transition_at() < cutoff
            };
            !expired || retain(key)
        });
        let purged = before.saturating_sub(self.machines.len());
        if purged > 0 {
            debug!(purged, "🧹 Settled request state machines purged");
        }
        purged
    }

    /// Number of machines currently in each state
    pub fn count_by_state(&self) -> HashMap<RequestState, usize> {
        let mut counts = HashMap::new();
        for entry in self.machines.iter() {
            *counts.entry(entry.value().lock().current_state()).or_insert(0) += 1;
        }
        counts
    }
}
