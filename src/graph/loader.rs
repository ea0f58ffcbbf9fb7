//! # Graph Loaders
//!
//! Builders of [`Graph`] values from an external origin. A loader failure
//! caused by I/O is transient (retried by the resilience stack); a payload
//! that parses but violates the graph shape is an input error.

use super::model::{Graph, GraphInput};
use crate::error::{Result, RouteError};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

#[async_trait]
pub trait GraphLoader: Send + Sync {
    /// Produce a freshly built graph
    async fn load(&self) -> Result<Graph>;

    /// Human-readable origin for logs
    fn source_name(&self) -> String;
}

/// Reads `{"edges": [...]}` from a JSON file on every load
#[derive(Debug, Clone)]
pub struct JsonFileGraphLoader {
    path: PathBuf,
}

impl JsonFileGraphLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl GraphLoader for JsonFileGraphLoader {
    async fn load(&self) -> Result<Graph> {
        let payload = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RouteError::GraphLoad(format!("failed to read {}: {e}", self.path.display()))
        })?;

        let graph = Graph::from_json_str(&payload)?;
        debug!(
            path = %self.path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Graph loaded from file"
        );
        Ok(graph)
    }

    fn source_name(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Serves an in-memory payload, e.g. one received in a message body
#[derive(Debug, Clone)]
pub struct StaticGraphLoader {
    input: GraphInput,
}

impl StaticGraphLoader {
    pub fn new(input: GraphInput) -> Self {
        Self { input }
    }
}

#[async_trait]
impl GraphLoader for StaticGraphLoader {
    async fn load(&self) -> Result<Graph> {
        Graph::from_input(&self.input)
    }

    fn source_name(&self) -> String {
        "static".to_string()
    }
}
