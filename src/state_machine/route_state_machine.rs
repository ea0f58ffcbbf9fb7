//! # Route State Machine
//!
//! One instance per idempotency key. Transitions are the only mutation path
//! and each one appends to an append-only history used for audit.

use super::{RequestEvent, RequestState};
use crate::cache::Fingerprint;
use crate::constants::ErrorCode;
use crate::error::{Result, RouteError};
use crate::orchestration::RouteResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One applied transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: RequestState,
    pub to: RequestState,
    pub event: String,
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RouteStateMachine {
    request_id: String,
    fingerprint: Fingerprint,
    state: RequestState,
    /// Set when the last failure was of a kind that forbids retry
    terminal_failure: bool,
    last_error: Option<ErrorCode>,
    history: Vec<TransitionRecord>,
    /// Response recorded when the request last settled, replayed by key
    response: Option<RouteResponse>,
    created_at: DateTime<Utc>,
}

impl RouteStateMachine {
    pub fn new(request_id: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            request_id: request_id.into(),
            fingerprint,
            state: RequestState::Init,
            terminal_failure: false,
            last_error: None,
            history: Vec::new(),
            response: None,
            created_at: Utc::now(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn current_state(&self) -> RequestState {
        self.state
    }

    pub fn last_error(&self) -> Option<ErrorCode> {
        self.last_error
    }

    pub fn is_terminal_failure(&self) -> bool {
        self.state == RequestState::Failure && self.terminal_failure
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the most recent transition (or creation)
    pub fn last_transition_at(&self) -> DateTime<Utc> {
        self.history.last().map_or(self.created_at, |record| record.at)
    }

    /// Milliseconds since the most recent entry into `Computing` (or creation)
    pub fn elapsed_ms(&self) -> i64 {
        let since = self
            .history
            .iter()
            .rev()
            .find(|record| record.to == RequestState::Computing)
            .map_or(self.created_at, |record| record.at);
        (Utc::now() - since).num_milliseconds()
    }

    pub fn response(&self) -> Option<&RouteResponse> {
        self.response.as_ref()
    }

    pub fn record_response(&mut self, response: RouteResponse) {
        self.response = Some(response);
    }

    /// Apply `event`, returning the new state
    pub fn transition(&mut self, event: RequestEvent) -> Result<RequestState> {
        let from = self.state;
        let to = self.determine_target_state(from, &event)?;

        match &event {
            RequestEvent::Fail { code, terminal } => {
                self.terminal_failure = *terminal;
                self.last_error = Some(*code);
            }
            RequestEvent::CompensationFailed(_) => {
                self.terminal_failure = true;
            }
            RequestEvent::Retry => {
                self.terminal_failure = false;
            }
            _ => {}
        }

        self.history.push(TransitionRecord {
            from,
            to,
            event: event.event_type().to_string(),
            detail: event.detail(),
            at: Utc::now(),
        });
        self.state = to;

        debug!(
            request_id = %self.request_id,
            from = %from,
            to = %to,
            event = event.event_type(),
            "State transition"
        );
        Ok(to)
    }

    /// Check a transition without applying it
    pub fn can_transition(&self, event: &RequestEvent) -> bool {
        self.determine_target_state(self.state, event).is_ok()
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(
        &self,
        current_state: RequestState,
        event: &RequestEvent,
    ) -> Result<RequestState> {
        let target = match (current_state, event) {
            (RequestState::Init, RequestEvent::Validate) => RequestState::Validated,
            (RequestState::Validated, RequestEvent::BeginComputation) => RequestState::Computing,
            (RequestState::Computing, RequestEvent::Complete) => RequestState::Success,

            // Failures can short-circuit from any pre-result state
            (
                RequestState::Init | RequestState::Validated | RequestState::Computing,
                RequestEvent::Fail { .. },
            ) => RequestState::Failure,

            (RequestState::Failure, RequestEvent::Retry) if !self.terminal_failure => {
                RequestState::Computing
            }

            (RequestState::Success, RequestEvent::Compensate) => RequestState::Compensating,
            (RequestState::Compensating, RequestEvent::CompensationSucceeded) => {
                RequestState::Compensated
            }
            (RequestState::Compensating, RequestEvent::CompensationFailed(_)) => {
                RequestState::Failure
            }

            (from_state, _) => {
                return Err(RouteError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::AlgorithmHint;

    fn machine() -> RouteStateMachine {
        RouteStateMachine::new(
            "req-1",
            Fingerprint::compute("g", "A", "B", AlgorithmHint::Auto),
        )
    }

    #[test]
    fn test_happy_path_and_history() {
        let mut sm = machine();
        sm.transition(RequestEvent::Validate).unwrap();
        sm.transition(RequestEvent::BeginComputation).unwrap();
        assert_eq!(sm.transition(RequestEvent::Complete).unwrap(), RequestState::Success);

        let states: Vec<_> = sm.history().iter().map(|r| r.to).collect();
        assert_eq!(
            states,
            vec![
                RequestState::Validated,
                RequestState::Computing,
                RequestState::Success
            ]
        );
        assert_eq!(sm.history()[0].from, RequestState::Init);
    }

    #[test]
    fn test_transient_failure_allows_retry() {
        let mut sm = machine();
        sm.transition(RequestEvent::Validate).unwrap();
        sm.transition(RequestEvent::BeginComputation).unwrap();
        sm.transition(RequestEvent::fail(ErrorCode::ComputationTimeout, false))
            .unwrap();

        assert!(!sm.is_terminal_failure());
        assert_eq!(sm.transition(RequestEvent::Retry).unwrap(), RequestState::Computing);
        assert_eq!(sm.transition(RequestEvent::Complete).unwrap(), RequestState::Success);
    }

    #[test]
    fn test_terminal_failure_forbids_retry() {
        let mut sm = machine();
        sm.transition(RequestEvent::Validate).unwrap();
        sm.transition(RequestEvent::fail(ErrorCode::NodeNotFound, true))
            .unwrap();

        assert!(sm.is_terminal_failure());
        assert_eq!(sm.last_error(), Some(ErrorCode::NodeNotFound));
        assert!(matches!(
            sm.transition(RequestEvent::Retry),
            Err(RouteError::InvalidTransition { .. })
        ));
        assert_eq!(sm.current_state(), RequestState::Failure);
    }

    #[test]
    fn test_compensation_flow() {
        let mut sm = machine();
        sm.transition(RequestEvent::Validate).unwrap();
        sm.transition(RequestEvent::BeginComputation).unwrap();
        sm.transition(RequestEvent::Complete).unwrap();

        assert_eq!(
            sm.transition(RequestEvent::Compensate).unwrap(),
            RequestState::Compensating
        );
        assert_eq!(
            sm.transition(RequestEvent::CompensationSucceeded).unwrap(),
            RequestState::Compensated
        );
        assert!(!sm.can_transition(&RequestEvent::Compensate));
    }

    #[test]
    fn test_failed_compensation_is_terminal() {
        let mut sm = machine();
        sm.transition(RequestEvent::Validate).unwrap();
        sm.transition(RequestEvent::BeginComputation).unwrap();
        sm.transition(RequestEvent::Complete).unwrap();
        sm.transition(RequestEvent::Compensate).unwrap();
        sm.transition(RequestEvent::CompensationFailed("cancel rejected".into()))
            .unwrap();

        assert!(sm.is_terminal_failure());
        assert!(!sm.can_transition(&RequestEvent::Retry));
        assert_eq!(
            sm.history().last().unwrap().detail.as_deref(),
            Some("cancel rejected")
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = machine();
        assert!(sm.transition(RequestEvent::Complete).is_err());
        assert!(sm.transition(RequestEvent::Compensate).is_err());
        assert!(sm.history().is_empty());
        assert_eq!(sm.current_state(), RequestState::Init);
    }
}
