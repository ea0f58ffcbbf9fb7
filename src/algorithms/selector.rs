//! Algorithm selection policy.

use super::{Algorithm, AlgorithmHint};
use crate::graph::Graph;

pub struct AlgorithmSelector;

impl AlgorithmSelector {
    /// Pick the algorithm for `graph` given the caller's hint.
    ///
    /// A concrete hint always wins, even when unsafe: Dijkstra on a graph
    /// with negative weights must still raise `NegativeWeightRejected`
    /// rather than fall back. `Auto` picks Bellman-Ford iff any edge weight
    /// is negative.
    pub fn select(graph: &Graph, hint: AlgorithmHint) -> Algorithm {
        match hint {
            AlgorithmHint::Dijkstra => Algorithm::Dijkstra,
            AlgorithmHint::BellmanFord => Algorithm::BellmanFord,
            AlgorithmHint::Auto => {
                if graph.has_negative_weights() {
                    Algorithm::BellmanFord
                } else {
                    Algorithm::Dijkstra
                }
            }
        }
    }
}
