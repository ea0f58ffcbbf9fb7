//! # Directed Weighted Graph
//!
//! Adjacency-map representation used by every path algorithm. Nodes are
//! implicit: adding an edge registers both endpoints, so a target with no
//! outgoing edges is still a node. Ordered maps keep traversal order
//! deterministic, which in turn keeps tie-breaking between equal-cost paths
//! stable across runs.

use crate::error::{Result, RouteError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// One edge as it appears on the wire: `{source, target, weight}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeInput {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

/// Graph payload: `{"edges": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphInput {
    pub edges: Vec<EdgeInput>,
}

/// Borrowed view of a single edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    adjacency: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or overwrite) a directed edge, registering both endpoints
    pub fn add_edge(
        &mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        weight: f64,
    ) -> Result<()> {
        let source = source.into();
        let target = target.into();

        if source.trim().is_empty() || target.trim().is_empty() {
            return Err(RouteError::InvalidGraph(
                "edge endpoints must be non-empty node identifiers".to_string(),
            ));
        }
        if !weight.is_finite() {
            return Err(RouteError::InvalidGraph(format!(
                "edge {source} -> {target} has non-finite weight {weight}"
            )));
        }

        self.adjacency.entry(target.clone()).or_default();
        self.adjacency.entry(source).or_default().insert(target, weight);
        Ok(())
    }

    pub fn from_edges<I, S, T>(edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, T, f64)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut graph = Self::new();
        for (source, target, weight) in edges {
            graph.add_edge(source, target, weight)?;
        }
        Ok(graph)
    }

    pub fn from_input(input: &GraphInput) -> Result<Self> {
        let mut graph = Self::new();
        for (index, edge) in input.edges.iter().enumerate() {
            graph
                .add_edge(edge.source.as_str(), edge.target.as_str(), edge.weight)
                .map_err(|e| match e {
                    RouteError::InvalidGraph(msg) => {
                        RouteError::InvalidGraph(format!("edge {index}: {msg}"))
                    }
                    other => other,
                })?;
        }
        Ok(graph)
    }

    /// Parse a `{"edges": [...]}` JSON document
    pub fn from_json_str(payload: &str) -> Result<Self> {
        let input: GraphInput = serde_json::from_str(payload)?;
        Self::from_input(&input)
    }

    pub fn to_input(&self) -> GraphInput {
        GraphInput {
            edges: self
                .edges()
                .map(|edge| EdgeInput {
                    source: edge.source.to_string(),
                    target: edge.target.to_string(),
                    weight: edge.weight,
                })
                .collect(),
        }
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.adjacency.contains_key(node)
    }

    /// Outgoing edges of `node` as `(target, weight)`, ordered by target
    pub fn neighbors<'a>(&'a self, node: &str) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        self.adjacency
            .get(node)
            .into_iter()
            .flat_map(|targets| targets.iter().map(|(t, w)| (t.as_str(), *w)))
    }

    pub fn weight(&self, source: &str, target: &str) -> Option<f64> {
        self.adjacency.get(source)?.get(target).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.adjacency.keys().map(String::as_str)
    }

    /// All edges ordered by `(source, target)`
    pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> {
        self.adjacency.iter().flat_map(|(source, targets)| {
            targets.iter().map(move |(target, weight)| Edge {
                source: source.as_str(),
                target: target.as_str(),
                weight: *weight,
            })
        })
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    pub fn has_negative_weights(&self) -> bool {
        self.first_negative_edge().is_some()
    }

    pub fn first_negative_edge(&self) -> Option<Edge<'_>> {
        self.edges().find(|edge| edge.weight < 0.0)
    }

    pub fn min_weight(&self) -> Option<f64> {
        self.edges().map(|edge| edge.weight).reduce(f64::min)
    }

    /// SHA-256 over the sorted edge set; independent of insertion order
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for node in self.nodes() {
            hasher.update(b"N");
            hasher.update((node.len() as u64).to_le_bytes());
            hasher.update(node.as_bytes());
        }
        for edge in self.edges() {
            hasher.update(b"E");
            hasher.update((edge.source.len() as u64).to_le_bytes());
            hasher.update(edge.source.as_bytes());
            hasher.update((edge.target.len() as u64).to_le_bytes());
            hasher.update(edge.target.as_bytes());
            hasher.update(edge.weight.to_bits().to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
