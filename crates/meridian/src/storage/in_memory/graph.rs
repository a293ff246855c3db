//! Edge lookups on the link graph.

use crate::domain::{IssueId, IssueLink, LinkId};
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

type LinkGraph = StableDiGraph<IssueId, IssueLink>;

/// The edge `source → target` of `link_type`, if present.
pub(super) fn find_edge(
    graph: &LinkGraph,
    source: NodeIndex,
    target: NodeIndex,
    link_type: &str,
) -> Option<EdgeIndex> {
    graph
        .edges_directed(source, Direction::Outgoing)
        .find(|edge| edge.target() == target && edge.weight().link_type == link_type)
        .map(|edge| edge.id())
}

/// The edge carrying link `id`, if present.
pub(super) fn edge_by_id(graph: &LinkGraph, id: &LinkId) -> Option<EdgeIndex> {
    graph
        .edge_indices()
        .find(|edge| graph.edge_weight(*edge).is_some_and(|link| &link.id == id))
}

/// Every edge with `node` at either end, optionally of one type.
///
/// Outgoing edges come first, then incoming ones.
pub(super) fn edges_touching(
    graph: &LinkGraph,
    node: NodeIndex,
    link_type: Option<&str>,
) -> Vec<EdgeIndex> {
    [Direction::Outgoing, Direction::Incoming]
        .into_iter()
        .flat_map(|direction| graph.edges_directed(node, direction))
        .filter(|edge| link_type.is_none_or(|t| edge.weight().link_type == t))
        .map(|edge| edge.id())
        .collect()
}
