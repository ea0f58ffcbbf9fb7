use proptest::prelude::*;
use route_orchestrator::graph::Graph;

pub const NODE_POOL: usize = 8;

pub fn node_name(index: usize) -> String {
    format!("n{index}")
}

/// Strategy for generating a single edge between pooled nodes (no self-loops)
pub fn edge_strategy(weights: std::ops::Range<f64>) -> impl Strategy<Value = (usize, usize, f64)> {
    (0..NODE_POOL, 0..NODE_POOL, weights).prop_filter("No self-loops", |(from, to, _)| from != to)
}

/// Strategy for generating graphs with only non-negative weights
pub fn non_negative_graph_strategy() -> impl Strategy<Value = Graph> {
    prop::collection::vec(edge_strategy(0.0..100.0), 1..30).prop_map(build)
}

/// Non-negative graphs with small integer weights, where equal-cost paths are common
pub fn tie_heavy_graph_strategy() -> impl Strategy<Value = Graph> {
    prop::collection::vec(
        (0..NODE_POOL, 0..NODE_POOL, 0u8..4).prop_filter("No self-loops", |(from, to, _)| from != to),
        1..30,
    )
    .prop_map(|edges| {
        build(
            edges
                .into_iter()
                .map(|(from, to, weight)| (from, to, f64::from(weight)))
                .collect(),
        )
    })
}

/// Strategy for graphs guaranteed to contain at least one negative edge
pub fn graph_with_negative_edge_strategy() -> impl Strategy<Value = Graph> {
    (
        prop::collection::vec(edge_strategy(0.0..100.0), 0..20),
        edge_strategy(-50.0..-0.5),
    )
        .prop_map(|(mut edges, negative)| {
            edges.retain(|(from, to, _)| !(*from == negative.0 && *to == negative.1));
            edges.push(negative);
            build(edges)
        })
}

/// Strategy for a chain from `n0` into a cycle whose weights sum below zero,
/// plus arbitrary non-negative noise edges that avoid the cycle's own pairs.
pub fn reachable_negative_cycle_strategy() -> impl Strategy<Value = Graph> {
    (
        2usize..5,
        prop::collection::vec(0.0f64..10.0, 5),
        prop::collection::vec(edge_strategy(0.0..100.0), 0..10),
    )
        .prop_map(|(cycle_len, weights, noise)| {
            // Cycle over n1..=n{cycle_len}, entered from n0
            let mut edges = vec![(0, 1, 1.0)];
            let mut total = 0.0;
            for i in 1..cycle_len {
                edges.push((i, i + 1, weights[i]));
                total += weights[i];
            }
            edges.push((cycle_len, 1, -(total + 1.0)));

            let cycle_pairs: Vec<(usize, usize)> = edges.iter().map(|(f, t, _)| (*f, *t)).collect();
            edges.extend(
                noise
                    .into_iter()
                    .filter(|(f, t, _)| !cycle_pairs.contains(&(*f, *t))),
            );
            build(edges)
        })
}

fn build(edges: Vec<(usize, usize, f64)>) -> Graph {
    Graph::from_edges(
        edges
            .into_iter()
            .map(|(from, to, weight)| (node_name(from), node_name(to), weight)),
    )
    .expect("generated edges are valid")
}
