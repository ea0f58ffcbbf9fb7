//! Shared helpers for integration tests: a scripted provider double, graph
//! fixtures and configuration presets.

#![allow(dead_code)]

pub mod strategies;

use async_trait::async_trait;
use parking_lot::Mutex;
use route_orchestrator::config::OrchestratorConfig;
use route_orchestrator::graph::Graph;
use route_orchestrator::orchestration::RouteOrchestrator;
use route_orchestrator::outbox::{DownstreamProvider, ProviderError, ProviderReply};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One scripted provider outcome
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(ProviderReply),
    Fail(ProviderError),
    /// Never answers within any realistic budget
    Hang,
}

/// Provider double that plays back queued outcomes, then falls back to
/// CONFIRMED for schedules and CANCELLED for cancellations.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    schedule_script: Mutex<VecDeque<Scripted>>,
    cancel_script: Mutex<VecDeque<Scripted>>,
    schedule_calls: AtomicU32,
    cancel_calls: AtomicU32,
    payloads: Mutex<Vec<Value>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_schedule(&self, outcomes: impl IntoIterator<Item = Scripted>) {
        self.schedule_script.lock().extend(outcomes);
    }

    pub fn script_cancel(&self, outcomes: impl IntoIterator<Item = Scripted>) {
        self.cancel_script.lock().extend(outcomes);
    }

    pub fn schedule_calls(&self) -> u32 {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> u32 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().clone()
    }

    async fn play(
        &self,
        next: Option<Scripted>,
        fallback: ProviderReply,
    ) -> Result<ProviderReply, ProviderError> {
        match next {
            None => Ok(fallback),
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(fallback)
            }
        }
    }
}

#[async_trait]
impl DownstreamProvider for ScriptedProvider {
    async fn schedule(
        &self,
        payload: &Value,
        _timeout: Duration,
    ) -> Result<ProviderReply, ProviderError> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().push(payload.clone());
        let next = self.schedule_script.lock().pop_front();
        self.play(next, ProviderReply::confirmed(json!({ "booking": "ok" })))
            .await
    }

    async fn cancel(
        &self,
        payload: &Value,
        _timeout: Duration,
    ) -> Result<ProviderReply, ProviderError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().push(payload.clone());
        let next = self.cancel_script.lock().pop_front();
        self.play(next, ProviderReply::new("CANCELLED", json!({})))
            .await
    }
}

/// Defaults with millisecond backoff and no jitter
pub fn fast_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 10;
    config.retry.jitter_enabled = false;
    config.timeouts.schedule_ms = 50;
    config.timeouts.cancel_ms = 50;
    config
}

pub fn orchestrator_with(
    config: OrchestratorConfig,
    provider: Arc<ScriptedProvider>,
) -> RouteOrchestrator {
    RouteOrchestrator::new(config, provider).expect("valid test configuration")
}

/// `A→B:5, A→C:2, C→D:1, D→F:-3, F→B:1, A→E:1, E→B:6`
pub fn negative_edge_graph() -> Arc<Graph> {
    Arc::new(
        Graph::from_edges([
            ("A", "B", 5.0),
            ("A", "C", 2.0),
            ("C", "D", 1.0),
            ("D", "F", -3.0),
            ("F", "B", 1.0),
            ("A", "E", 1.0),
            ("E", "B", 6.0),
        ])
        .expect("valid graph"),
    )
}

/// `A→B:5, A→C:2, C→B:1`
pub fn triangle_graph() -> Arc<Graph> {
    Arc::new(Graph::from_edges([("A", "B", 5.0), ("A", "C", 2.0), ("C", "B", 1.0)]).expect("valid graph"))
}

/// `A→B:1, B→C:1, C→A:-3`, a loop summing to -1
pub fn negative_cycle_graph() -> Arc<Graph> {
    Arc::new(Graph::from_edges([("A", "B", 1.0), ("B", "C", 1.0), ("C", "A", -3.0)]).expect("valid graph"))
}

/// Chain `n0999 → n0998 → ... → n0000` whose edge order forces Bellman-Ford
/// through one relaxation per pass.
pub fn slow_chain_graph(len: usize) -> Arc<Graph> {
    let edges = (1..len).map(|i| (format!("n{i:04}"), format!("n{:04}", i - 1), 1.0));
    Arc::new(Graph::from_edges(edges).expect("valid graph"))
}
