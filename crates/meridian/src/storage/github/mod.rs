//! GitHub storage backend.
//!
//! Issues are GitHub issues, identified by their GraphQL node id. Links go
//! through the [`StrategyRouter`]: native dependencies and sub-issues where
//! GitHub has them, body markers everywhere else.
//!
//! Strategies speak in local issue numbers. [`IssueIndex`] translates
//! between numbers and node ids with a read-through cache that is filled by
//! listing the repository and only shrinks on delete.

mod issues;
mod links;

pub use issues::GitHubIssueRepository;
pub use links::GitHubLinkRepository;

use super::Backend;
use crate::domain::{Issue, IssueId, IssueState, RepoConfig};
use crate::error::{Error, Result};
use crate::github::{GitHubApi, GitHubIssue, NotFoundMeans, list_all_issues};
use crate::strategy::StrategyRouter;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Build issue and link repositories over `client`.
///
/// Both share one [`IssueIndex`].
#[must_use]
pub fn new_github_backend(
    client: Arc<dyn GitHubApi>,
    repo: RepoConfig,
    router: StrategyRouter,
) -> Backend {
    let index = Arc::new(IssueIndex::new(client.clone(), repo));
    Backend {
        issues: Arc::new(GitHubIssueRepository::new(client.clone(), index.clone())),
        links: Arc::new(GitHubLinkRepository::new(client, index, router)),
    }
}

/// What the index remembers about one issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedIssue {
    /// Domain identifier (node id)
    pub id: IssueId,

    /// Local issue number
    pub number: u64,

    /// Database id, the handle relationship endpoints take
    pub database_id: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl From<&GitHubIssue> for IndexedIssue {
    fn from(issue: &GitHubIssue) -> Self {
        Self {
            id: IssueId::new(issue.node_id.clone()),
            number: issue.number,
            database_id: issue.id,
            created_at: issue.created_at,
        }
    }
}

#[derive(Debug, Default)]
struct IndexCache {
    by_id: HashMap<IssueId, IndexedIssue>,
    by_number: HashMap<u64, IssueId>,
}

impl IndexCache {
    fn insert(&mut self, entry: IndexedIssue) {
        self.by_number.insert(entry.number, entry.id.clone());
        self.by_id.insert(entry.id.clone(), entry);
    }

    fn by_number(&self, number: u64) -> Option<&IndexedIssue> {
        self.by_number.get(&number).and_then(|id| self.by_id.get(id))
    }

    fn remove(&mut self, id: &IssueId) {
        if let Some(entry) = self.by_id.remove(id) {
            self.by_number.remove(&entry.number);
        }
    }
}

/// Number ↔ node id translation for one repository.
pub struct IssueIndex {
    client: Arc<dyn GitHubApi>,
    repo: RepoConfig,
    cache: RwLock<IndexCache>,
}

impl std::fmt::Debug for IssueIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueIndex")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

impl IssueIndex {
    /// An empty index for `repo`.
    pub fn new(client: Arc<dyn GitHubApi>, repo: RepoConfig) -> Self {
        Self {
            client,
            repo,
            cache: RwLock::new(IndexCache::default()),
        }
    }

    /// The repository this index covers.
    #[must_use]
    pub fn repo(&self) -> &RepoConfig {
        &self.repo
    }

    /// Record an issue seen in any response.
    pub async fn remember(&self, issue: &GitHubIssue) -> IndexedIssue {
        let entry = IndexedIssue::from(issue);
        self.cache.write().await.insert(entry.clone());
        entry
    }

    /// Drop an issue from the cache.
    pub async fn forget(&self, id: &IssueId) {
        self.cache.write().await.remove(id);
    }

    /// Resolve a node id, listing the repository on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns the mapped backing-store error if the listing fails.
    pub async fn lookup(&self, id: &IssueId) -> Result<Option<IndexedIssue>> {
        if let Some(entry) = self.cache.read().await.by_id.get(id) {
            return Ok(Some(entry.clone()));
        }
        self.refresh().await?;
        Ok(self.cache.read().await.by_id.get(id).cloned())
    }

    /// Like [`Self::lookup`], failing for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the id is not an issue of this repository.
    pub async fn require(&self, id: &IssueId) -> Result<IndexedIssue> {
        self.lookup(id)
            .await?
            .ok_or_else(|| Error::issue_not_found(id.as_str()))
    }

    /// Resolve a local number, fetching the issue on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no live issue has that number.
    pub async fn by_number(&self, number: u64) -> Result<IndexedIssue> {
        if let Some(entry) = self.cache.read().await.by_number(number) {
            return Ok(entry.clone());
        }
        let issue = self
            .client
            .get_issue(&self.repo, number)
            .await
            .map_err(|e| e.into_domain(NotFoundMeans::issue(number)))?;
        if issue.is_deleted() {
            return Err(Error::issue_not_found(format!("#{number}")));
        }
        Ok(self.remember(&issue).await)
    }

    /// Re-list the repository into the cache.
    ///
    /// Returns the live issues; deleted ones are dropped from the cache.
    ///
    /// # Errors
    ///
    /// Returns the mapped backing-store error if the listing fails.
    pub async fn refresh(&self) -> Result<Vec<GitHubIssue>> {
        let mut issues = list_all_issues(self.client.as_ref(), &self.repo)
            .await
            .map_err(|e| e.into_domain(NotFoundMeans::FeatureDisabled("repository issues")))?;
        let mut cache = self.cache.write().await;
        issues.retain(|issue| {
            let entry = IndexedIssue::from(issue);
            if issue.is_deleted() {
                cache.remove(&entry.id);
                false
            } else {
                cache.insert(entry);
                true
            }
        });
        debug!(repo = %self.repo, count = issues.len(), "Filled issue index");
        Ok(issues)
    }
}

/// Domain view of a GitHub issue.
pub(crate) fn to_domain(issue: GitHubIssue, parent_id: Option<IssueId>) -> Issue {
    let state = if issue.state.eq_ignore_ascii_case("closed") {
        IssueState::Closed
    } else {
        IssueState::Open
    };
    Issue {
        id: IssueId::new(issue.node_id),
        number: issue.number,
        title: issue.title,
        body: issue.body,
        state,
        parent_id,
        created_at: issue.created_at,
        updated_at: issue.updated_at,
    }
}
