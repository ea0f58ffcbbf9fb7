//! # Result Validator
//!
//! Independent recomputation of a claimed path against the graph. Every
//! successful computation passes through here before it is cached or
//! returned; a failure means an algorithm bug, so it surfaces as an internal
//! error.

use super::PathResult;
use crate::constants::system::COST_TOLERANCE;
use crate::error::{Result, RouteError};
use crate::graph::Graph;

pub struct ResultValidator;

impl ResultValidator {
    pub fn validate(graph: &Graph, path: &[String], claimed_cost: f64) -> Result<()> {
        if path.len() < 2 {
            return Err(RouteError::ResultValidation(format!(
                "path must contain at least two nodes, got {}",
                path.len()
            )));
        }

        let mut recomputed = 0.0;
        for pair in path.windows(2) {
            let weight = graph.weight(&pair[0], &pair[1]).ok_or_else(|| {
                RouteError::ResultValidation(format!(
                    "path uses missing edge {} -> {}",
                    pair[0], pair[1]
                ))
            })?;
            recomputed += weight;
        }

        if (recomputed - claimed_cost).abs() > COST_TOLERANCE {
            return Err(RouteError::ResultValidation(format!(
                "claimed cost {claimed_cost} differs from recomputed cost {recomputed}"
            )));
        }
        Ok(())
    }

    pub fn validate_result(graph: &Graph, result: &PathResult) -> Result<()> {
        Self::validate(graph, &result.path, result.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(nodes: &[&str]) -> Vec<String> {
        nodes.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_accepts_consistent_path() {
        let graph = Graph::from_edges([("A", "C", 2.0), ("C", "B", 1.0)]).unwrap();
        assert!(ResultValidator::validate(&graph, &path(&["A", "C", "B"]), 3.0).is_ok());
        assert!(ResultValidator::validate(&graph, &path(&["A", "C", "B"]), 3.0 + 1e-7).is_ok());
    }

    #[test]
    fn test_rejects_short_paths() {
        let graph = Graph::from_edges([("A", "B", 1.0)]).unwrap();
        assert!(matches!(
            ResultValidator::validate(&graph, &path(&["A"]), 0.0),
            Err(RouteError::ResultValidation(_))
        ));
        assert!(ResultValidator::validate(&graph, &[], 0.0).is_err());
    }

    #[test]
    fn test_rejects_missing_edge_and_cost_mismatch() {
        let graph = Graph::from_edges([("A", "B", 1.0), ("B", "C", 1.0)]).unwrap();
        assert!(ResultValidator::validate(&graph, &path(&["A", "C"]), 2.0).is_err());
        assert!(ResultValidator::validate(&graph, &path(&["A", "B", "C"]), 2.1).is_err());
    }
}
