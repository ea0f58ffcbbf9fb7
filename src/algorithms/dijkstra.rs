//! # Dijkstra
//!
//! Priority-queue shortest path for graphs without negative weights.
//!
//! A node is settled only when it is popped with the smallest cost seen so
//! far, never when it is first relaxed. Stale heap entries for settled nodes
//! are skipped. The search keeps settling until the heap passes the goal's
//! cost, then the path is read off the settled distances with the same
//! canonical walk Bellman-Ford uses, so both agree on equal-cost ties.

use super::{canonical_path, check_endpoints, Algorithm, PathAlgorithm, PathResult};
use crate::error::{Result, RouteError};
use crate::graph::Graph;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::trace;

#[derive(Debug, Clone, Copy, Default)]
pub struct Dijkstra;

#[derive(Debug, Clone, Copy)]
struct QueueEntry<'a> {
    cost: f64,
    node: &'a str,
}

impl PartialEq for QueueEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry<'_> {}

impl PartialOrd for QueueEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry<'_> {
    // Reversed so the max-heap pops the cheapest entry first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(self.node))
    }
}

impl PathAlgorithm for Dijkstra {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Dijkstra
    }

    fn find_path(&self, graph: &Graph, start: &str, goal: &str) -> Result<PathResult> {
        if graph.is_empty() {
            return Err(RouteError::EmptyGraph);
        }
        // Checked over the whole graph, reachable or not
        if let Some(edge) = graph.first_negative_edge() {
            return Err(RouteError::NegativeWeightRejected {
                from: edge.source.to_string(),
                to: edge.target.to_string(),
                weight: edge.weight,
            });
        }
        check_endpoints(graph, start, goal)?;

        let mut tentative: HashMap<&str, f64> = HashMap::new();
        let mut settled: HashMap<&str, f64> = HashMap::new();
        let mut goal_cost = None;
        let mut queue = BinaryHeap::new();

        tentative.insert(start, 0.0);
        queue.push(QueueEntry {
            cost: 0.0,
            node: start,
        });

        while let Some(QueueEntry { cost, node }) = queue.pop() {
            // Everything at or below the goal's cost must settle so equal-cost
            // alternatives are visible to the canonical path walk
            if goal_cost.is_some_and(|limit| cost > limit) {
                break;
            }
            if settled.contains_key(node) {
                continue;
            }
            settled.insert(node, cost);
            if node == goal {
                goal_cost = Some(cost);
            }

            for (neighbor, weight) in graph.neighbors(node) {
                if settled.contains_key(neighbor) {
                    continue;
                }
                let candidate = cost + weight;
                let improves = tentative
                    .get(neighbor)
                    .map_or(true, |known| candidate < *known);
                if improves {
                    tentative.insert(neighbor, candidate);
                    queue.push(QueueEntry {
                        cost: candidate,
                        node: neighbor,
                    });
                }
            }
        }

        let Some(cost) = goal_cost else {
            return Err(RouteError::NoPathFound {
                start: start.to_string(),
                goal: goal.to_string(),
            });
        };

        let path = canonical_path(graph, &settled, start, goal)?;
        trace!(start, goal, cost, hops = path.len(), "Dijkstra reached goal");
        Ok(PathResult {
            path,
            cost,
            algorithm: Algorithm::Dijkstra,
        })
    }
}
