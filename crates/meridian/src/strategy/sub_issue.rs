//! Native sub-issues.
//!
//! A `parent` edge runs from the parent to the child. The child's database
//! id is what the sub-issue endpoints take.

use super::{PARENT, internal_id, or_absent, or_empty, or_existing};
use crate::domain::{ParsedNativeLink, RepoConfig};
use crate::error::Result;
use crate::github::{ApiError, GitHubApi, GitHubIssue, NotFoundMeans};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

const FEATURE: &str = "sub-issues";

/// Persists `parent` edges as native sub-issues.
#[derive(Clone)]
pub struct SubIssueStrategy {
    client: Arc<dyn GitHubApi>,
}

impl fmt::Debug for SubIssueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubIssueStrategy").finish_non_exhaustive()
    }
}

impl SubIssueStrategy {
    /// Create a strategy over `client`.
    pub fn new(client: Arc<dyn GitHubApi>) -> Self {
        Self { client }
    }

    /// Attach `child` under `parent`.
    ///
    /// An existing parent is not replaced; GitHub rejects that, and the
    /// rejection is returned as a validation error. A duplicate answer only
    /// counts as success once `child` is seen under `parent`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `child` does not exist, or the mapped
    /// backing-store error for anything but an existing sub-issue.
    pub async fn create_link(&self, parent: u64, child: u64, repo: &RepoConfig) -> Result<()> {
        let child_id = internal_id(self.client.as_ref(), repo, child).await?;
        debug!(parent, child, "Adding sub-issue");
        match self.client.add_sub_issue(repo, parent, child_id, false).await {
            Err(e) if e.is_duplicate_relationship() => {
                self.confirm_parent(parent, child, repo, e).await
            }
            result => or_existing(result, FEATURE, parent, child),
        }
    }

    /// Accept a duplicate answer only if `child` really sits under `parent`.
    async fn confirm_parent(
        &self,
        parent: u64,
        child: u64,
        repo: &RepoConfig,
        rejection: ApiError,
    ) -> Result<()> {
        let current = self
            .client
            .get_parent(repo, child)
            .await
            .map_err(|e| e.into_domain(NotFoundMeans::FeatureDisabled(FEATURE)))?;
        match current {
            Some(current) if current.number == parent => {
                debug!(parent, child, "Sub-issue already attached");
                Ok(())
            }
            current => {
                warn!(
                    parent,
                    child,
                    current = current.map(|issue| issue.number),
                    "Duplicate answer without the sub-issue in place"
                );
                Err(rejection.into_domain(NotFoundMeans::FeatureDisabled(FEATURE)))
            }
        }
    }

    /// Detach `child` from `parent`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `child` does not exist, or the mapped
    /// backing-store error for anything but a missing sub-issue.
    pub async fn delete_link(&self, parent: u64, child: u64, repo: &RepoConfig) -> Result<()> {
        let child_id = internal_id(self.client.as_ref(), repo, child).await?;
        debug!(parent, child, "Removing sub-issue");
        or_absent(
            self.client.remove_sub_issue(repo, parent, child_id).await,
            FEATURE,
            parent,
            child,
        )
    }

    /// Children of `number`, then its parent (reversed) when it has one.
    ///
    /// # Errors
    ///
    /// Returns the mapped backing-store error; a not-found answer on either
    /// query empties that half instead.
    pub async fn find_links_by_issue(
        &self,
        number: u64,
        repo: &RepoConfig,
    ) -> Result<Vec<ParsedNativeLink>> {
        let children = or_empty(
            self.client.list_sub_issues(repo, number).await,
            FEATURE,
            number,
        )?;
        let parent = or_empty(self.client.get_parent(repo, number).await, FEATURE, number)?;

        let links = children
            .iter()
            .map(|issue| native_link(issue, repo, false))
            .chain(parent.iter().map(|issue| native_link(issue, repo, true)))
            .collect();
        Ok(links)
    }
}

fn native_link(issue: &GitHubIssue, fallback: &RepoConfig, reversed: bool) -> ParsedNativeLink {
    let repo = issue.repo_or(fallback);
    ParsedNativeLink {
        link_type: PARENT.to_string(),
        owner: repo.owner,
        repo: repo.repo,
        issue_number: issue.number,
        reversed,
    }
}
