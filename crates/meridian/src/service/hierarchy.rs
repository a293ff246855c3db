//! Hierarchy validator.
//!
//! The parent pointer forms a forest. Reparenting keeps it that way:
//!
//! - no issue may end up among its own ancestors
//! - no issue may sit more than [`MAX_DEPTH`] levels below its root
//!
//! Depth counts parent hops, so a root is at depth 0 and a chain
//! `A ← B ← C ← D` is exactly at the limit.
//!
//! Walks keep a visited set and stop at the first repeated issue, so data
//! that is already inconsistent (a loop written by another client) cannot
//! hang a request.

use crate::audit::{AuditEntry, AuditLog};
use crate::domain::{Issue, IssueId};
use crate::error::{Error, Result};
use crate::storage::IssueRepository;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum number of parent hops from any issue to its root.
pub const MAX_DEPTH: usize = 3;

/// Everything below one issue.
#[derive(Debug, Default)]
struct Subtree {
    descendants: HashSet<IssueId>,
    /// Hops from the subtree's root to its deepest descendant
    depth: usize,
}

/// Moves issues within the parent/child tree.
#[derive(Clone)]
pub struct HierarchyService {
    issues: Arc<dyn IssueRepository>,
    audit: Arc<dyn AuditLog>,
}

impl std::fmt::Debug for HierarchyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchyService").finish_non_exhaustive()
    }
}

impl HierarchyService {
    /// Create a service writing audit entries to `audit`.
    pub fn new(issues: Arc<dyn IssueRepository>, audit: Arc<dyn AuditLog>) -> Self {
        Self { issues, audit }
    }

    async fn require(&self, id: &IssueId) -> Result<Issue> {
        self.issues
            .get(id)
            .await?
            .ok_or_else(|| Error::issue_not_found(id.as_str()))
    }

    /// Place `issue` under `parent`, or make it a root with `None`.
    ///
    /// On success the new pointer is persisted and exactly one audit entry
    /// is recorded. On failure nothing is written.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if `issue == parent`
    /// - `Error::NotFound` if either issue doesn't exist
    /// - `Error::Validation` if `parent` is a descendant of `issue`
    /// - `Error::Validation` if the move would push any issue deeper than
    ///   [`MAX_DEPTH`]
    pub async fn reparent(&self, issue: &IssueId, parent: Option<&IssueId>) -> Result<Issue> {
        let Some(parent) = parent else {
            let current = self.require(issue).await?;
            let updated = self.issues.set_parent(issue, None).await?;
            self.audit
                .record(AuditEntry::parent_change(
                    issue.clone(),
                    current.parent_id,
                    None,
                ))
                .await?;
            return Ok(updated);
        };

        if issue == parent {
            return Err(Error::validation(
                "parent_id",
                format!("issue {issue} cannot be its own parent"),
            ));
        }
        let current = self.require(issue).await?;
        self.require(parent).await?;

        let subtree = self.subtree(issue).await?;
        if subtree.descendants.contains(parent) {
            return Err(Error::validation(
                "parent_id",
                format!("moving {issue} under {parent} would create a cycle"),
            ));
        }

        let parent_depth = self.ancestor_depth(parent).await?;
        let deepest = parent_depth + 1 + subtree.depth;
        if deepest > MAX_DEPTH {
            return Err(Error::validation(
                "parent_id",
                format!(
                    "moving {issue} under {parent} would nest issues {deepest} levels deep (maximum {MAX_DEPTH})"
                ),
            ));
        }

        debug!(issue_id = %issue, parent_id = %parent, depth = deepest, "Reparenting");
        let updated = self.issues.set_parent(issue, Some(parent)).await?;
        self.audit
            .record(AuditEntry::parent_change(
                issue.clone(),
                current.parent_id,
                Some(parent.clone()),
            ))
            .await?;
        Ok(updated)
    }

    /// Number of ancestors above `id`.
    async fn ancestor_depth(&self, id: &IssueId) -> Result<usize> {
        let mut visited = HashSet::from([id.clone()]);
        let mut depth = 0;
        let mut current = self.issues.get(id).await?.and_then(|issue| issue.parent_id);

        while let Some(ancestor) = current {
            if !visited.insert(ancestor.clone()) {
                warn!(issue_id = %id, ancestor = %ancestor, "Parent chain loops back on itself");
                break;
            }
            depth += 1;
            current = self
                .issues
                .get(&ancestor)
                .await?
                .and_then(|issue| issue.parent_id);
        }
        Ok(depth)
    }

    /// Breadth-first walk over the children of `root`.
    async fn subtree(&self, root: &IssueId) -> Result<Subtree> {
        let mut subtree = Subtree::default();
        let mut visited = HashSet::from([root.clone()]);
        let mut frontier = vec![root.clone()];
        let mut level = 0;

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for id in &frontier {
                for child in self.issues.children(id).await? {
                    if visited.insert(child.id.clone()) {
                        next.push(child.id);
                    } else {
                        warn!(issue_id = %child.id, "Issue reached twice while walking children");
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            level += 1;
            subtree.descendants.extend(next.iter().cloned());
            frontier = next;
        }

        subtree.depth = level;
        Ok(subtree)
    }
}
