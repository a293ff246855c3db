//! Link persistence strategies.
//!
//! GitHub has no general-purpose edge, so each relationship type is persisted
//! by one of three mechanisms:
//!
//! | Strategy                  | Types                  | Mechanism                         |
//! |---------------------------|------------------------|-----------------------------------|
//! | [`DependencyStrategy`]    | `blocks`, `blocked_by` | native "blocked by" dependencies  |
//! | [`SubIssueStrategy`]      | `parent`               | native sub-issues                 |
//! | [`CommentStrategy`]       | any other name         | markers in the source issue body  |
//!
//! All three share one contract, dispatched through the closed
//! [`LinkStrategy`] enum. Local issue numbers go in; [`ParsedNativeLink`]s
//! come out. Mapping numbers to domain identifiers is the caller's job.
//!
//! # Idempotency
//!
//! - `create_link` succeeds when the edge already exists.
//! - `delete_link` succeeds when the edge is already gone.
//! - `find_links_by_issue` treats a disabled native feature as "no edges".
//!
//! Every other backing-store failure is mapped through
//! [`ApiError::into_domain`](crate::github::ApiError::into_domain) and
//! returned.

use crate::domain::{ParsedNativeLink, RepoConfig};
use crate::error::Result;
use crate::github::{ApiResult, GitHubApi, NotFoundMeans};
use tracing::{debug, warn};

pub mod comment;
pub mod dependency;
pub mod router;
pub mod sub_issue;

pub use comment::CommentStrategy;
pub use dependency::DependencyStrategy;
pub use router::StrategyRouter;
pub use sub_issue::SubIssueStrategy;

pub use crate::registry::{BLOCKED_BY, PARENT};

/// One of the three persistence mechanisms.
#[derive(Debug)]
pub enum LinkStrategy {
    /// Native "blocked by" dependencies.
    Dependency(DependencyStrategy),

    /// Native sub-issues.
    SubIssue(SubIssueStrategy),

    /// Markers in the source issue's body.
    Comment(CommentStrategy),
}

impl LinkStrategy {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Dependency(_) => "dependency",
            Self::SubIssue(_) => "sub-issue",
            Self::Comment(s) => s.link_type(),
        }
    }

    /// Persist one directed edge. Safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns the mapped backing-store error for anything other than an
    /// already-existing edge.
    pub async fn create_link(&self, source: u64, target: u64, repo: &RepoConfig) -> Result<()> {
        match self {
            Self::Dependency(s) => s.create_link(source, target, repo).await,
            Self::SubIssue(s) => s.create_link(source, target, repo).await,
            Self::Comment(s) => s.create_link(source, target, repo).await,
        }
    }

    /// Remove one directed edge. Absence is not an error.
    ///
    /// # Errors
    ///
    /// Returns the mapped backing-store error for unrelated failures.
    pub async fn delete_link(&self, source: u64, target: u64, repo: &RepoConfig) -> Result<()> {
        match self {
            Self::Dependency(s) => s.delete_link(source, target, repo).await,
            Self::SubIssue(s) => s.delete_link(source, target, repo).await,
            Self::Comment(s) => s.delete_link(source, target, repo).await,
        }
    }

    /// Every edge of this strategy touching issue `number`.
    ///
    /// # Errors
    ///
    /// Returns the mapped backing-store error; a disabled native feature is
    /// not an error.
    pub async fn find_links_by_issue(
        &self,
        number: u64,
        repo: &RepoConfig,
    ) -> Result<Vec<ParsedNativeLink>> {
        match self {
            Self::Dependency(s) => s.find_links_by_issue(number, repo).await,
            Self::SubIssue(s) => s.find_links_by_issue(number, repo).await,
            Self::Comment(s) => s.find_links_by_issue(number, repo).await,
        }
    }
}

/// Treat a not-found answer from a feature-gated read as "nothing there".
fn or_empty<T: Default>(result: ApiResult<T>, feature: &'static str, number: u64) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_not_found() => {
            warn!(feature, number, "Feature unavailable, treating as no links");
            Ok(T::default())
        }
        Err(e) => Err(e.into_domain(NotFoundMeans::FeatureDisabled(feature))),
    }
}

/// Treat a duplicate-relationship answer from a create call as success.
fn or_existing(
    result: ApiResult<()>,
    feature: &'static str,
    source: u64,
    target: u64,
) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_duplicate_relationship() => {
            debug!(feature, source, target, "Relationship already exists");
            Ok(())
        }
        Err(e) => Err(e.into_domain(NotFoundMeans::FeatureDisabled(feature))),
    }
}

/// Treat a not-found answer from a removal call as already removed.
fn or_absent(
    result: ApiResult<()>,
    feature: &'static str,
    source: u64,
    target: u64,
) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!(feature, source, target, "Relationship already absent");
            Ok(())
        }
        Err(e) => Err(e.into_domain(NotFoundMeans::FeatureDisabled(feature))),
    }
}

/// Database id of issue `number`, the handle relationship endpoints take.
async fn internal_id(client: &dyn GitHubApi, repo: &RepoConfig, number: u64) -> Result<u64> {
    client
        .get_issue(repo, number)
        .await
        .map(|issue| issue.id)
        .map_err(|e| e.into_domain(NotFoundMeans::issue(number)))
}
