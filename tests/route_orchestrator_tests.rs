//! End-to-end request lifecycle through the orchestrator: algorithm
//! selection, error responses, idempotency and single-flight computation.

mod common;

use common::*;
use route_orchestrator::algorithms::{Algorithm, AlgorithmHint};
use route_orchestrator::constants::{ErrorCode, ResponseStatus};
use route_orchestrator::graph::{Graph, GraphInput, JsonFileGraphLoader, StaticGraphLoader};
use route_orchestrator::orchestration::RouteRequest;
use route_orchestrator::outbox::OutboxEventType;
use route_orchestrator::state_machine::RequestState;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn path(nodes: &[&str]) -> Option<Vec<String>> {
    Some(nodes.iter().map(|n| n.to_string()).collect())
}

#[tokio::test]
async fn test_negative_edge_graph_selects_bellman_ford() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());

    let response = orchestrator
        .route(RouteRequest::new("req-neg", "A", "B"), negative_edge_graph())
        .await;

    assert_eq!(response.status, ResponseStatus::Success);
    assert_eq!(response.algorithm_used, Some(Algorithm::BellmanFord));
    assert_eq!(response.path, path(&["A", "C", "D", "F", "B"]));
    assert_eq!(response.cost, Some(1.0));
    assert_eq!(response.metadata.graph_nodes, 6);
    assert_eq!(response.metadata.graph_edges, 7);
    assert!(!response.metadata.cache_hit);
}

#[tokio::test]
async fn test_non_negative_graph_selects_dijkstra() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());

    let response = orchestrator
        .route(RouteRequest::new("req-tri", "A", "B"), triangle_graph())
        .await;

    assert_eq!(response.algorithm_used, Some(Algorithm::Dijkstra));
    assert_eq!(response.path, path(&["A", "C", "B"]));
    assert_eq!(response.cost, Some(3.0));
}

#[tokio::test]
async fn test_negative_cycle_response() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());

    let response = orchestrator
        .route(RouteRequest::new("req-cycle", "A", "C"), negative_cycle_graph())
        .await;

    assert_eq!(response.status, ResponseStatus::Error);
    assert_eq!(response.path, None);
    let error = response.error.expect("error body");
    assert_eq!(error.code, ErrorCode::NegativeCycleDetected);
    assert!(error.details["cycle_cost"].as_f64().unwrap() < 0.0);
    assert!(error.details["cycle"].as_array().unwrap().len() >= 2);

    assert_eq!(
        orchestrator.request_state("req-cycle"),
        Some(RequestState::Failure)
    );
    assert!(orchestrator.outbox().is_empty());
}

#[tokio::test]
async fn test_positive_loop_is_not_a_negative_cycle() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());
    let graph = Arc::new(Graph::from_edges([("A", "B", 1.0), ("B", "C", 1.0), ("C", "A", -1.0)]).unwrap());

    let response = orchestrator
        .route(RouteRequest::new("req-loop", "A", "C"), graph)
        .await;

    assert_eq!(response.algorithm_used, Some(Algorithm::BellmanFord));
    assert_eq!(response.path, path(&["A", "B", "C"]));
    assert_eq!(response.cost, Some(2.0));
}

#[tokio::test]
async fn test_empty_graph() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());

    let response = orchestrator
        .route(RouteRequest::new("req-empty", "A", "B"), Arc::new(Graph::new()))
        .await;

    assert_eq!(response.error_code(), Some(ErrorCode::EmptyGraph));
    assert_eq!(orchestrator.metrics().attempts_total, 0);
}

#[tokio::test]
async fn test_request_validation_errors() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());

    let same_endpoints = orchestrator
        .route(RouteRequest::new("req-same", "A", "A"), triangle_graph())
        .await;
    assert_eq!(same_endpoints.error_code(), Some(ErrorCode::InvalidRequest));

    let missing = orchestrator
        .route(RouteRequest::new("req-missing", "A", "Z"), triangle_graph())
        .await;
    assert_eq!(missing.error_code(), Some(ErrorCode::NodeNotFound));
    assert_eq!(missing.error.unwrap().details["node"], "Z");

    let forced = orchestrator
        .route(
            RouteRequest::new("req-forced", "A", "B").with_hint(AlgorithmHint::Dijkstra),
            negative_edge_graph(),
        )
        .await;
    assert_eq!(forced.error_code(), Some(ErrorCode::InvalidGraph));
}

#[tokio::test]
async fn test_identical_request_is_served_from_cache() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());

    let first = orchestrator
        .route(RouteRequest::new("req-a", "A", "B"), negative_edge_graph())
        .await;
    let attempts_after_first = orchestrator.metrics().attempts_total;

    let second = orchestrator
        .route(RouteRequest::new("req-b", "A", "B"), negative_edge_graph())
        .await;

    assert_eq!(first.path, second.path);
    assert_eq!(first.cost, second.cost);
    assert_eq!(first.algorithm_used, second.algorithm_used);
    assert!(second.metadata.cache_hit);
    assert_eq!(second.request_id, "req-b");

    let metrics = orchestrator.metrics();
    assert_eq!(metrics.attempts_total, attempts_after_first);
    assert_eq!(metrics.retries_total, 0);
    assert_eq!(metrics.cache_hits, 1);
    assert_eq!(orchestrator.request_state("req-b"), Some(RequestState::Success));

    // Only the computing request owes a downstream side effect
    assert_eq!(orchestrator.outbox().len(), 1);
    assert_eq!(
        orchestrator.outbox().events_for_request("req-a")[0].event_type,
        OutboxEventType::ScheduleRoute
    );
}

#[tokio::test]
async fn test_cached_terminal_error_for_new_key() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());

    orchestrator
        .route(RouteRequest::new("req-1", "A", "C"), negative_cycle_graph())
        .await;
    let replay = orchestrator
        .route(RouteRequest::new("req-2", "A", "C"), negative_cycle_graph())
        .await;

    assert_eq!(replay.error_code(), Some(ErrorCode::NegativeCycleDetected));
    assert!(replay.metadata.cache_hit);
    assert_eq!(orchestrator.metrics().attempts_total, 1);
    assert_eq!(orchestrator.request_state("req-2"), Some(RequestState::Failure));
}

#[tokio::test]
async fn test_key_replays_after_cache_eviction() {
    let mut config = fast_config();
    config.cache.max_entries = 1;
    let orchestrator = orchestrator_with(config, ScriptedProvider::new());

    let original = orchestrator
        .route(RouteRequest::new("req-keep", "A", "B"), triangle_graph())
        .await;
    // Evicts the only cache slot
    orchestrator
        .route(RouteRequest::new("req-other", "A", "C"), triangle_graph())
        .await;
    assert_eq!(orchestrator.cache_stats().evictions, 1);

    let replay = orchestrator
        .route(RouteRequest::new("req-keep", "A", "B"), triangle_graph())
        .await;

    assert_eq!(replay.path, original.path);
    assert!(replay.metadata.cache_hit);
    assert_eq!(orchestrator.metrics().attempts_total, 2);
}

#[tokio::test]
async fn test_key_reuse_with_different_inputs_is_rejected() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());

    orchestrator
        .route(RouteRequest::new("req-dup", "A", "B"), triangle_graph())
        .await;
    let conflict = orchestrator
        .route(RouteRequest::new("req-dup", "A", "C"), triangle_graph())
        .await;

    assert_eq!(conflict.error_code(), Some(ErrorCode::InvalidRequest));
    assert!(conflict
        .error
        .unwrap()
        .message
        .contains("already used with different request parameters"));
    assert_eq!(orchestrator.request_state("req-dup"), Some(RequestState::Success));
}

#[tokio::test]
async fn test_computation_timeout_is_retryable_with_same_key() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());
    let graph = slow_chain_graph(1000);
    let request = RouteRequest::new("req-slow", "n0999", "n0000")
        .with_hint(AlgorithmHint::BellmanFord);

    let timed_out = orchestrator
        .route(request.clone().with_timeout_ms(1), Arc::clone(&graph))
        .await;
    assert_eq!(timed_out.status, ResponseStatus::Timeout);
    assert_eq!(timed_out.error_code(), Some(ErrorCode::ComputationTimeout));
    assert_eq!(orchestrator.request_state("req-slow"), Some(RequestState::Failure));
    assert_eq!(orchestrator.metrics().timeouts_total, 1);

    // Transient failures are neither cached nor recorded against the key
    let retried = orchestrator.route(request, graph).await;
    assert_eq!(retried.status, ResponseStatus::Success);
    assert_eq!(retried.cost, Some(999.0));
    assert!(!retried.metadata.cache_hit);
    assert_eq!(orchestrator.metrics().attempts_total, 2);
    assert_eq!(orchestrator.request_state("req-slow"), Some(RequestState::Success));

    let history: Vec<_> = orchestrator
        .registry()
        .get("req-slow")
        .unwrap()
        .lock()
        .history()
        .iter()
        .map(|record| record.event.clone())
        .collect();
    assert_eq!(
        history,
        vec!["validate", "begin_computation", "fail", "retry", "complete"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_identical_requests_compute_once() {
    let orchestrator = Arc::new(orchestrator_with(fast_config(), ScriptedProvider::new()));
    let graph = slow_chain_graph(300);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            let graph = Arc::clone(&graph);
            tokio::spawn(async move {
                orchestrator
                    .route(
                        RouteRequest::new(format!("req-{i}"), "n0299", "n0000")
                            .with_hint(AlgorithmHint::BellmanFord),
                        graph,
                    )
                    .await
            })
        })
        .collect();

    let responses = futures::future::join_all(handles).await;
    let responses: Vec<_> = responses.into_iter().map(|r| r.unwrap()).collect();

    assert!(responses.iter().all(|r| r.cost == Some(299.0)));
    assert_eq!(responses.iter().filter(|r| !r.metadata.cache_hit).count(), 1);
    assert_eq!(orchestrator.metrics().attempts_total, 1);
    assert_eq!(orchestrator.metrics().requests_total, 8);
    assert_eq!(orchestrator.open_gates(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abandoned_computation_leaves_key_retryable() {
    let orchestrator = Arc::new(orchestrator_with(fast_config(), ScriptedProvider::new()));
    let graph = slow_chain_graph(2000);
    let request = RouteRequest::new("req-abandoned", "n1999", "n0000")
        .with_hint(AlgorithmHint::BellmanFord)
        .with_timeout_ms(60_000);

    let caller = {
        let orchestrator = Arc::clone(&orchestrator);
        let graph = Arc::clone(&graph);
        let request = request.clone();
        tokio::spawn(async move { orchestrator.route(request, graph).await })
    };

    let computing = tokio::time::timeout(Duration::from_secs(5), async {
        while orchestrator.request_state("req-abandoned") != Some(RequestState::Computing) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(computing.is_ok(), "request never reached COMPUTING");

    // Caller goes away while the computation is in flight
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());

    {
        let machine = orchestrator.registry().get("req-abandoned").unwrap();
        let machine = machine.lock();
        assert_eq!(machine.current_state(), RequestState::Failure);
        assert!(!machine.is_terminal_failure());
        assert!(machine.response().is_none());
    }
    assert_eq!(orchestrator.open_gates(), 0);

    let retried = orchestrator.route(request, graph).await;
    assert_eq!(retried.status, ResponseStatus::Success);
    assert_eq!(retried.cost, Some(1999.0));
    assert_eq!(
        orchestrator.request_state("req-abandoned"),
        Some(RequestState::Success)
    );

    let history: Vec<_> = orchestrator
        .registry()
        .get("req-abandoned")
        .unwrap()
        .lock()
        .history()
        .iter()
        .map(|record| record.event.clone())
        .collect();
    assert_eq!(
        history,
        vec!["validate", "begin_computation", "fail", "retry", "complete"]
    );
}

#[tokio::test]
async fn test_route_with_file_loader() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}",
        json!({"edges": [
            {"source": "A", "target": "B", "weight": 5},
            {"source": "A", "target": "C", "weight": 2},
            {"source": "C", "target": "B", "weight": 1}
        ]})
    )
    .unwrap();

    let loader = JsonFileGraphLoader::new(file.path());
    let response = orchestrator
        .route_with_loader(RouteRequest::new("req-file", "A", "B"), &loader)
        .await;

    assert_eq!(response.path, path(&["A", "C", "B"]));
}

#[tokio::test]
async fn test_unreadable_graph_source_is_retried_then_reported() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());
    let loader = JsonFileGraphLoader::new("/nonexistent/graph.json");

    let response = orchestrator
        .route_with_loader(RouteRequest::new("req-io", "A", "B"), &loader)
        .await;

    assert_eq!(response.error_code(), Some(ErrorCode::InternalError));
    assert_eq!(response.error.unwrap().message, "Graph source is unavailable");
    let metrics = orchestrator.metrics();
    assert_eq!(metrics.attempts_total, 3);
    assert_eq!(metrics.retries_total, 2);
    assert_eq!(metrics.error_total, 1);
}

#[tokio::test]
async fn test_malformed_payload_is_not_retried() {
    let orchestrator = orchestrator_with(fast_config(), ScriptedProvider::new());
    let loader = StaticGraphLoader::new(GraphInput {
        edges: vec![route_orchestrator::graph::EdgeInput {
            source: "A".into(),
            target: String::new(),
            weight: 1.0,
        }],
    });

    let response = orchestrator
        .route_with_loader(RouteRequest::new("req-bad", "A", "B"), &loader)
        .await;

    assert_eq!(response.error_code(), Some(ErrorCode::InvalidGraph));
    assert_eq!(orchestrator.metrics().attempts_total, 1);
}
