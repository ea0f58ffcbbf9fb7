//! # Path Algorithms
//!
//! Shortest-path strategies over a [`Graph`], the policy that picks between
//! them, and the independent validator every successful result passes
//! through before it is cached or returned.
//!
//! Algorithms are pure functions of their inputs. They raise typed
//! [`RouteError`]s and never decide whether a failure is retried; that call
//! belongs to the orchestrator.

pub mod bellman_ford;
pub mod dijkstra;
pub mod selector;
pub mod validator;

pub use bellman_ford::BellmanFord;
pub use dijkstra::Dijkstra;
pub use selector::AlgorithmSelector;
pub use validator::ResultValidator;

use crate::error::{Result, RouteError};
use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

/// Concrete shortest-path algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Dijkstra,
    BellmanFord,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dijkstra => "dijkstra",
            Self::BellmanFord => "bellman_ford",
        }
    }

    /// Run this algorithm
    pub fn find_path(&self, graph: &Graph, start: &str, goal: &str) -> Result<PathResult> {
        match self {
            Self::Dijkstra => Dijkstra.find_path(graph, start, goal),
            Self::BellmanFord => BellmanFord.find_path(graph, start, goal),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller preference carried on a route request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmHint {
    #[default]
    Auto,
    Dijkstra,
    BellmanFord,
}

impl AlgorithmHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Dijkstra => "dijkstra",
            Self::BellmanFord => "bellman_ford",
        }
    }
}

impl fmt::Display for AlgorithmHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmHint {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "dijkstra" => Ok(Self::Dijkstra),
            "bellman_ford" => Ok(Self::BellmanFord),
            other => Err(RouteError::InvalidRequest(format!(
                "unknown algorithm hint '{other}', expected auto, dijkstra or bellman_ford"
            ))),
        }
    }
}

/// A computed route: ordered node ids plus the summed edge weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub path: Vec<String>,
    pub cost: f64,
    pub algorithm: Algorithm,
}

/// Strategy interface implemented by each shortest-path algorithm
pub trait PathAlgorithm: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    fn find_path(&self, graph: &Graph, start: &str, goal: &str) -> Result<PathResult>;
}

/// Shared preconditions: non-empty graph and both endpoints present
pub(crate) fn check_endpoints(graph: &Graph, start: &str, goal: &str) -> Result<()> {
    if graph.is_empty() {
        return Err(RouteError::EmptyGraph);
    }
    for node in [start, goal] {
        if !graph.contains_node(node) {
            return Err(RouteError::NodeNotFound {
                node: node.to_string(),
            });
        }
    }
    Ok(())
}

/// Canonical shortest path read off a finished distance map.
///
/// Breadth-first search from `start` over tight edges only
/// (`distances[u] + w == distances[v]`), expanding neighbours in id order.
/// The result is the fewest-hop shortest path, ties going to the
/// lexicographically earlier branch. It depends only on the graph and the
/// distances, so any algorithm producing the same distances yields the same
/// path.
pub(crate) fn canonical_path<'a>(
    graph: &'a Graph,
    distances: &HashMap<&'a str, f64>,
    start: &'a str,
    goal: &str,
) -> Result<Vec<String>> {
    let mut parents: HashMap<&str, &str> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::from([start]);
    let mut frontier: VecDeque<&str> = VecDeque::from([start]);

    while let Some(node) = frontier.pop_front() {
        if node == goal {
            break;
        }
        let Some(base) = distances.get(node).copied() else {
            continue;
        };
        for (next, weight) in graph.neighbors(node) {
            if seen.contains(next) {
                continue;
            }
            let tight = distances
                .get(next)
                .is_some_and(|known| base + weight == *known);
            if tight {
                seen.insert(next);
                parents.insert(next, node);
                frontier.push_back(next);
            }
        }
    }

    if !seen.contains(goal) {
        return Err(RouteError::Internal(format!(
            "no tight edge chain from {start} reaches {goal}"
        )));
    }
    reconstruct_path(&parents, start, goal, graph.node_count())
}

/// Walk the predecessor chain back from `goal`.
///
/// The chain is bounded by the node count so a corrupted map cannot loop.
pub(crate) fn reconstruct_path(
    predecessors: &HashMap<&str, &str>,
    start: &str,
    goal: &str,
    node_count: usize,
) -> Result<Vec<String>> {
    let mut path = vec![goal.to_string()];
    let mut current = goal;

    while current != start {
        if path.len() > node_count {
            return Err(RouteError::Internal(format!(
                "predecessor chain from {goal} does not terminate at {start}"
            )));
        }
        current = predecessors.get(current).copied().ok_or_else(|| {
            RouteError::Internal(format!("missing predecessor for {current}"))
        })?;
        path.push(current.to_string());
    }

    path.reverse();
    Ok(path)
}
