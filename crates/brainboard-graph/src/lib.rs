//! Force-graph projection of the org knowledge graph.
//!
//! Turns the flat entity/edge lists the backend returns into a node/link
//! structure a force-directed layout can consume, plus search, neighbor,
//! filter, and stats queries over it. Everything here is pure and
//! synchronous; every operation allocates new structures.

pub mod style;
mod transform;

pub use style::{style_for, NodeStyle};
pub use transform::{
    build_graph, filter_by_type, node_neighbors, search_nodes, stats, EndpointRef, Graph,
    GraphLink, GraphNode, GraphStats,
};
