//! # Graph Module
//!
//! Directed weighted graph model plus loaders that build it from files or
//! message payloads. Graphs are treated as read-only once handed to an
//! algorithm; the orchestrator shares them behind an `Arc`.

pub mod loader;
pub mod model;

pub use loader::{GraphLoader, JsonFileGraphLoader, StaticGraphLoader};
pub use model::{Edge, EdgeInput, Graph, GraphInput};
