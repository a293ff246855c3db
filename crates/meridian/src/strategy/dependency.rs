//! Native "blocked by" dependencies.
//!
//! `A blocks B` is stored on GitHub as "B is blocked by A", so creation and
//! removal address the target issue and pass the source's database id.

use super::{internal_id, or_absent, or_empty, or_existing};
use crate::domain::{ParsedNativeLink, RepoConfig};
use crate::error::Result;
use crate::github::{GitHubApi, GitHubIssue};
use crate::registry::BLOCKS;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const FEATURE: &str = "issue dependencies";

/// Persists `blocks` edges as native dependencies.
#[derive(Clone)]
pub struct DependencyStrategy {
    client: Arc<dyn GitHubApi>,
}

impl fmt::Debug for DependencyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyStrategy").finish_non_exhaustive()
    }
}

impl DependencyStrategy {
    /// Create a strategy over `client`.
    pub fn new(client: Arc<dyn GitHubApi>) -> Self {
        Self { client }
    }

    /// Mark `target` as blocked by `source`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `source` does not exist, or the mapped
    /// backing-store error for anything but an existing dependency.
    pub async fn create_link(&self, source: u64, target: u64, repo: &RepoConfig) -> Result<()> {
        let blocker_id = internal_id(self.client.as_ref(), repo, source).await?;
        debug!(source, target, "Adding blocked-by dependency");
        or_existing(
            self.client.add_blocked_by(repo, target, blocker_id).await,
            FEATURE,
            source,
            target,
        )
    }

    /// Remove the "blocked by `source`" mark from `target`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `source` does not exist, or the mapped
    /// backing-store error for anything but a missing dependency.
    pub async fn delete_link(&self, source: u64, target: u64, repo: &RepoConfig) -> Result<()> {
        let blocker_id = internal_id(self.client.as_ref(), repo, source).await?;
        debug!(source, target, "Removing blocked-by dependency");
        or_absent(
            self.client.remove_blocked_by(repo, target, blocker_id).await,
            FEATURE,
            source,
            target,
        )
    }

    /// Issues blocking `number` (reversed) and issues `number` blocks.
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
        let blocked_by = or_empty(
            self.client.list_blocked_by(repo, number).await,
            FEATURE,
            number,
        )?;
        let blocking = or_empty(
            self.client.list_blocking(repo, number).await,
            FEATURE,
            number,
        )?;

        let links = blocked_by
            .iter()
            .map(|issue| native_link(issue, repo, true))
            .chain(blocking.iter().map(|issue| native_link(issue, repo, false)))
            .collect();
        Ok(links)
    }
}

fn native_link(issue: &GitHubIssue, fallback: &RepoConfig, reversed: bool) -> ParsedNativeLink {
    let repo = issue.repo_or(fallback);
    ParsedNativeLink {
        link_type: BLOCKS.to_string(),
        owner: repo.owner,
        repo: repo.repo,
        issue_number: issue.number,
        reversed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::github::{ApiError, ApiStatus, FakeGitHub, FakeOp};

    async fn setup() -> (Arc<FakeGitHub>, DependencyStrategy, RepoConfig) {
        let repo = RepoConfig::new("acme", "widgets");
        let fake = Arc::new(FakeGitHub::new(repo.clone()));
        for title in ["Schema", "Migration", "Rollout"] {
            fake.seed_issue(title, None).await;
        }
        let strategy = DependencyStrategy::new(fake.clone());
        (fake, strategy, repo)
    }

    #[tokio::test]
    async fn test_create_marks_target_blocked_by_source() {
        let (fake, strategy, repo) = setup().await;

        strategy.create_link(1, 2, &repo).await.unwrap();

        assert!(fake.is_blocked_by(2, 1).await);
        assert!(!fake.is_blocked_by(1, 2).await);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let (fake, strategy, repo) = setup().await;

        strategy.create_link(1, 2, &repo).await.unwrap();
        strategy.create_link(1, 2, &repo).await.unwrap();

        assert!(fake.is_blocked_by(2, 1).await);
        assert_eq!(strategy.find_links_by_issue(2, &repo).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_from_both_ends() {
        let (_fake, strategy, repo) = setup().await;
        strategy.create_link(1, 2, &repo).await.unwrap();

        let from_source = strategy.find_links_by_issue(1, &repo).await.unwrap();
        assert_eq!(
            from_source,
            vec![ParsedNativeLink::outgoing(BLOCKS, &repo, 2)]
        );

        let from_target = strategy.find_links_by_issue(2, &repo).await.unwrap();
        assert_eq!(from_target.len(), 1);
        assert_eq!(from_target[0].issue_number, 1);
        assert!(from_target[0].reversed);
    }

    #[tokio::test]
    async fn test_delete_missing_dependency_is_noop() {
        let (fake, strategy, repo) = setup().await;
        strategy.create_link(1, 2, &repo).await.unwrap();

        strategy.delete_link(1, 2, &repo).await.unwrap();
        strategy.delete_link(1, 2, &repo).await.unwrap();

        assert!(!fake.is_blocked_by(2, 1).await);
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let (_fake, strategy, repo) = setup().await;

        let err = strategy.create_link(99, 2, &repo).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "issue", ref id } if id == "#99"));
    }

    #[tokio::test]
    async fn test_disabled_feature_degrades_reads() {
        let (fake, strategy, repo) = setup().await;
        strategy.create_link(1, 2, &repo).await.unwrap();
        fake.set_dependencies_enabled(false).await;

        assert!(strategy.find_links_by_issue(2, &repo).await.unwrap().is_empty());

        let err = strategy.create_link(2, 3, &repo).await.unwrap_err();
        assert!(matches!(err, Error::Domain { code: "feature_disabled", .. }));
    }

    #[tokio::test]
    async fn test_server_errors_propagate() {
        let (fake, strategy, repo) = setup().await;
        fake.fail_next(
            FakeOp::ListBlocking,
            ApiError::status(ApiStatus::Server(502), "Bad Gateway"),
        )
        .await;

        let err = strategy.find_links_by_issue(1, &repo).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Domain);
    }

    #[tokio::test]
    async fn test_create_propagates_authorization_failure() {
        let (fake, strategy, repo) = setup().await;
        fake.fail_next(
            FakeOp::AddBlockedBy,
            ApiError::status(ApiStatus::Forbidden, "Resource not accessible"),
        )
        .await;

        let err = strategy.create_link(1, 2, &repo).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }
}
