//! Core in-memory storage data structures.

use crate::domain::{Issue, IssueId, IssueLink};
use crate::error::{Error, Result};
use crate::ids::IssueIdGenerator;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::HashMap;

/// Inner store (not thread-safe).
///
/// Every issue in `issues` has exactly one node in `graph`, recorded in
/// `node_map`.
pub(crate) struct InMemoryStoreInner {
    /// Issues indexed by ID for O(1) lookups
    pub(super) issues: HashMap<IssueId, Issue>,

    /// Link graph. Nodes hold issue IDs, edges hold links.
    ///
    /// A stable graph keeps indices valid when issues are removed.
    pub(super) graph: StableDiGraph<IssueId, IssueLink>,

    /// Mapping from IssueId to graph NodeIndex
    pub(super) node_map: HashMap<IssueId, NodeIndex>,

    /// ID generator for new issues
    pub(super) id_generator: IssueIdGenerator,

    /// Local number handed to the next created issue
    pub(super) next_number: u64,
}

impl InMemoryStoreInner {
    /// Create an empty store
    pub(crate) fn new(prefix: String) -> Self {
        Self {
            issues: HashMap::new(),
            graph: StableDiGraph::new(),
            node_map: HashMap::new(),
            id_generator: IssueIdGenerator::new(prefix),
            next_number: 1,
        }
    }

    /// Graph node of an existing issue.
    pub(super) fn node(&self, id: &IssueId) -> Result<NodeIndex> {
        self.node_map
            .get(id)
            .copied()
            .ok_or_else(|| Error::issue_not_found(id.as_str()))
    }
}
