//! # Bellman-Ford
//!
//! Edge-relaxation shortest path that tolerates negative weights and detects
//! negative cycles reachable from the start node.
//!
//! Relaxation runs at most `|V| - 1` passes and stops early after a pass with
//! no update. One extra pass follows: any edge still relaxable proves a
//! reachable negative cycle. The cycle is recovered by stepping back `|V|`
//! predecessors from the last vertex relaxed in that pass, which is
//! guaranteed to land on the cycle, then following predecessors until the
//! walk closes.

use super::{canonical_path, check_endpoints, Algorithm, PathAlgorithm, PathResult};
use crate::error::{Result, RouteError};
use crate::graph::{Edge, Graph};
use std::collections::HashMap;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, Default)]
pub struct BellmanFord;

impl PathAlgorithm for BellmanFord {
    fn algorithm(&self) -> Algorithm {
        Algorithm::BellmanFord
    }

    fn find_path(&self, graph: &Graph, start: &str, goal: &str) -> Result<PathResult> {
        check_endpoints(graph, start, goal)?;

        let node_count = graph.node_count();
        let edges: Vec<Edge<'_>> = graph.edges().collect();
        let mut distances: HashMap<&str, f64> = HashMap::with_capacity(node_count);
        let mut predecessors: HashMap<&str, &str> = HashMap::with_capacity(node_count);
        distances.insert(start, 0.0);

        let mut passes = 0;
        for _ in 1..node_count {
            passes += 1;
            if !relax_all(&edges, &mut distances, &mut predecessors).0 {
                break;
            }
        }
        trace!(passes, node_count, "Bellman-Ford relaxation converged");

        if let (true, Some(last_relaxed)) = relax_all(&edges, &mut distances, &mut predecessors) {
            let (cycle, cycle_cost) = extract_cycle(graph, &predecessors, last_relaxed)?;
            debug!(
                start,
                cycle = %cycle.join(" -> "),
                cycle_cost,
                "Negative cycle reachable from start"
            );
            return Err(RouteError::NegativeCycleDetected { cycle, cycle_cost });
        }

        let cost = match distances.get(goal) {
            Some(cost) => *cost,
            None => {
                return Err(RouteError::NoPathFound {
                    start: start.to_string(),
                    goal: goal.to_string(),
                })
            }
        };

        let path = canonical_path(graph, &distances, start, goal)?;
        Ok(PathResult {
            path,
            cost,
            algorithm: Algorithm::BellmanFord,
        })
    }
}

/// One full pass over every edge.
///
/// Returns whether anything changed and the last vertex whose distance
/// improved. Unreached sources (absent from `distances`) are skipped, so only
/// cycles reachable from the start can ever relax.
fn relax_all<'g>(
    edges: &[Edge<'g>],
    distances: &mut HashMap<&'g str, f64>,
    predecessors: &mut HashMap<&'g str, &'g str>,
) -> (bool, Option<&'g str>) {
    let mut last_relaxed = None;

    for edge in edges {
        let Some(source_distance) = distances.get(edge.source).copied() else {
            continue;
        };
        let candidate = source_distance + edge.weight;
        let improves = distances
            .get(edge.target)
            .map_or(true, |known| candidate < *known);
        if improves {
            distances.insert(edge.target, candidate);
            predecessors.insert(edge.target, edge.source);
            last_relaxed = Some(edge.target);
        }
    }

    (last_relaxed.is_some(), last_relaxed)
}

fn extract_cycle(
    graph: &Graph,
    predecessors: &HashMap<&str, &str>,
    relaxed: &str,
) -> Result<(Vec<String>, f64)> {
    let step_back = |node: &str| -> Result<&str> {
        predecessors
            .get(node)
            .copied()
            .ok_or_else(|| RouteError::Internal(format!("missing predecessor for {node}")))
    };

    let mut on_cycle = relaxed;
    for _ in 0..graph.node_count() {
        on_cycle = step_back(on_cycle)?;
    }

    let mut reversed = vec![on_cycle];
    let mut current = step_back(on_cycle)?;
    while current != on_cycle {
        if reversed.len() > graph.node_count() {
            return Err(RouteError::Internal(
                "predecessor walk did not close a cycle".to_string(),
            ));
        }
        reversed.push(current);
        current = step_back(current)?;
    }
    reversed.push(on_cycle);
    reversed.reverse();

    let mut cycle_cost = 0.0;
    for pair in reversed.windows(2) {
        cycle_cost += graph.weight(pair[0], pair[1]).ok_or_else(|| {
            RouteError::Internal(format!("cycle edge {} -> {} missing", pair[0], pair[1]))
        })?;
    }

    Ok((
        reversed.into_iter().map(str::to_string).collect(),
        cycle_cost,
    ))
}
