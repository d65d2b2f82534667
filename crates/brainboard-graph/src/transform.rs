use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use brainboard_schema::{Edge, Entity};

use crate::style::{confidence_style, style_for};

/// Presentation-ready projection of an [`Entity`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    /// Node size for the layout engine.
    pub val: f64,
    pub color: String,
    pub entity_type: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A link endpoint. Starts life as a raw node-id string; force-layout
/// engines replace endpoints with resolved node objects in place once the
/// simulation starts, so readers must accept both shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndpointRef {
    Id(String),
    Resolved { id: String },
}

impl EndpointRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Resolved { id } => id,
        }
    }
}

impl PartialEq for EndpointRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

/// Presentation-ready projection of an [`Edge`], with both endpoints
/// resolved to node ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: EndpointRef,
    pub target: EndpointRef,
    pub label: String,
    pub color: String,
    pub width: f64,
    pub confidence: f64,
    pub relation: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub node_count: usize,
    pub link_count: usize,
    pub by_type: HashMap<String, usize>,
    pub avg_degree: f64,
}

/// Build a force-graph structure from flat entity and edge lists.
///
/// Edges reference entities by name, so a case-insensitive `name -> entity`
/// join resolves each endpoint to a node id. When two entities share a name
/// the later one wins; backends treat names as unique per org, and when
/// they are not, the latest record is the freshest. Edges with an endpoint
/// that resolves to no known entity are dropped with a diagnostic, never an
/// error, and never produce a dangling node.
///
/// Node order matches entity input order, so output is deterministic for a
/// fixed input.
pub fn build_graph(entities: &[Entity], edges: &[Edge]) -> Graph {
    let mut by_name: HashMap<String, &Entity> = HashMap::with_capacity(entities.len());
    for entity in entities {
        by_name.insert(entity.name.to_lowercase(), entity);
    }

    let nodes: Vec<GraphNode> = entities
        .iter()
        .map(|entity| {
            let style = style_for(&entity.entity_type);
            GraphNode {
                id: entity.id.clone(),
                name: entity.name.clone(),
                val: style.size,
                color: style.color.to_string(),
                entity_type: entity.entity_type.clone(),
                metadata: entity.metadata.clone(),
                created_at: entity.created_at,
            }
        })
        .collect();

    let mut links = Vec::with_capacity(edges.len());
    for edge in edges {
        let source = by_name.get(edge.source.name.to_lowercase().as_str());
        let target = by_name.get(edge.target.name.to_lowercase().as_str());
        let (Some(source), Some(target)) = (source, target) else {
            warn!(
                edge_id = %edge.id,
                source = %edge.source.name,
                target = %edge.target.name,
                "dropping edge with unresolvable endpoint"
            );
            continue;
        };

        let (width, color) = confidence_style(edge.confidence);
        links.push(GraphLink {
            source: EndpointRef::Id(source.id.clone()),
            target: EndpointRef::Id(target.id.clone()),
            label: edge.relation.clone(),
            color: color.to_string(),
            width,
            confidence: edge.confidence,
            relation: edge.relation.clone(),
            created_at: edge.created_at,
        });
    }

    Graph { nodes, links }
}

/// Case-insensitive substring search over node names. An empty or
/// whitespace query matches nothing, not everything.
pub fn search_nodes<'a>(graph: &'a Graph, query: &str) -> Vec<&'a GraphNode> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return vec![];
    }
    graph
        .nodes
        .iter()
        .filter(|node| node.name.to_lowercase().contains(&query))
        .collect()
}

/// Deduplicated ids of every node connected to `node_id` by any link, in
/// either direction. Accepts links whose endpoints are raw id strings or
/// layout-resolved objects.
pub fn node_neighbors(graph: &Graph, node_id: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut neighbors = Vec::new();
    for link in &graph.links {
        let other = if link.source.id() == node_id {
            link.target.id()
        } else if link.target.id() == node_id {
            link.source.id()
        } else {
            continue;
        };
        if seen.insert(other.to_string()) {
            neighbors.push(other.to_string());
        }
    }
    neighbors
}

/// Keep nodes whose type is in `types` (case-insensitive) and only links
/// whose endpoints both survive the node filter.
pub fn filter_by_type(graph: &Graph, types: &[&str]) -> Graph {
    let wanted: HashSet<String> = types.iter().map(|t| t.to_lowercase()).collect();
    let nodes: Vec<GraphNode> = graph
        .nodes
        .iter()
        .filter(|node| wanted.contains(&node.entity_type.to_lowercase()))
        .cloned()
        .collect();
    let surviving: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    let links = graph
        .links
        .iter()
        .filter(|link| surviving.contains(link.source.id()) && surviving.contains(link.target.id()))
        .cloned()
        .collect();
    Graph { nodes, links }
}

/// Node/link counts, per-type node counts, and average degree
/// (`2 * links / nodes`, 0 when the graph is empty).
pub fn stats(graph: &Graph) -> GraphStats {
    let mut by_type: HashMap<String, usize> = HashMap::new();
    for node in &graph.nodes {
        *by_type.entry(node.entity_type.clone()).or_default() += 1;
    }
    let avg_degree = if graph.nodes.is_empty() {
        0.0
    } else {
        2.0 * graph.links.len() as f64 / graph.nodes.len() as f64
    };
    GraphStats {
        node_count: graph.nodes.len(),
        link_count: graph.links.len(),
        by_type,
        avg_degree,
    }
}
