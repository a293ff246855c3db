//! Storage abstraction layer for meridian.
//!
//! Two repository traits cover everything the use cases need from a backing
//! store:
//!
//! - [`IssueRepository`]: issues and their single-valued parent pointer
//! - [`LinkRepository`]: typed links between issues
//!
//! Two backends implement both:
//!
//! - **In-memory**: `HashMap` plus a petgraph graph of links, ephemeral
//! - **GitHub**: a repository on GitHub, with links persisted through the
//!   strategy layer
//!
//! # Architecture
//!
//! The traits are async and object-safe and take `&self`, so one backend
//! handle can be shared across tasks behind an `Arc`. Backends use interior
//! mutability for their own state.
//!
//! # Example
//!
//! ```
//! use meridian::domain::NewIssue;
//! use meridian::registry::RelationshipRegistry;
//! use meridian::storage::{StorageBackend, create_backend};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> meridian::error::Result<()> {
//!     let backend = create_backend(
//!         StorageBackend::InMemory { prefix: "mer".to_string() },
//!         &RelationshipRegistry::with_defaults(),
//!     )?;
//!
//!     let issue = backend.issues.create(NewIssue::titled("Write docs")).await?;
//!     assert!(issue.id.as_str().starts_with("mer-"));
//!     Ok(())
//! }
//! ```

use crate::domain::{Issue, IssueFilter, IssueId, IssueLink, LinkId, NewIssue, RepoConfig};
use crate::error::Result;
use crate::github::{GitHubApi, RestGitHubClient};
use crate::registry::RelationshipRegistry;
use crate::strategy::StrategyRouter;
use async_trait::async_trait;
use std::sync::Arc;

pub mod github;
pub mod in_memory;

/// Issue persistence.
///
/// Implementations must be `Send + Sync`; every method takes `&self`.
#[async_trait]
pub trait IssueRepository: Send + Sync {
    /// Create a new issue.
    ///
    /// Implementations **MUST** call [`NewIssue::validate`] first.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for an invalid payload.
    async fn create(&self, issue: NewIssue) -> Result<Issue>;

    /// Get an issue by ID. Returns `None` if it doesn't exist.
    async fn get(&self, id: &IssueId) -> Result<Option<Issue>>;

    /// List issues matching `filter`, ordered by local number.
    async fn list(&self, filter: &IssueFilter) -> Result<Vec<Issue>>;

    /// Direct children of `id` in the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `id` doesn't exist.
    async fn children(&self, id: &IssueId) -> Result<Vec<Issue>>;

    /// Point `id` at `parent`, or clear its parent with `None`.
    ///
    /// No hierarchy rules are checked here; see
    /// [`HierarchyService`](crate::service::HierarchyService).
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if either issue doesn't exist.
    async fn set_parent(&self, id: &IssueId, parent: Option<&IssueId>) -> Result<Issue>;

    /// Delete an issue. Its children lose their parent.
    ///
    /// The GitHub backend cannot delete issues: it closes them as not
    /// planned and treats every issue in that state as absent from then on.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the issue doesn't exist.
    async fn delete(&self, id: &IssueId) -> Result<()>;
}

/// Link persistence.
///
/// Repositories store what they are given: self-link, type and symmetry
/// rules are enforced by [`LinkService`](crate::service::LinkService).
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Persist `link` and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if an endpoint doesn't exist.
    async fn create(&self, link: IssueLink) -> Result<IssueLink>;

    /// Look up a link by its identifier.
    async fn find_by_id(&self, id: &LinkId) -> Result<Option<IssueLink>>;

    /// Look up the link `source → target` of `link_type`.
    async fn find(
        &self,
        source: &IssueId,
        target: &IssueId,
        link_type: &str,
    ) -> Result<Option<IssueLink>>;

    /// Every link with `issue` at either end, optionally of one type.
    async fn list_by_issue(&self, issue: &IssueId, link_type: Option<&str>)
    -> Result<Vec<IssueLink>>;

    /// Remove a link. Returns whether it existed.
    async fn delete(&self, id: &LinkId) -> Result<bool>;

    /// Remove every link with `issue` at either end. Returns how many.
    async fn delete_by_issue_id(&self, issue: &IssueId) -> Result<usize>;
}

/// Storage backend configuration.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// In-memory storage (ephemeral)
    InMemory {
        /// Prefix for generated issue IDs
        prefix: String,
    },

    /// A GitHub repository
    GitHub {
        /// Repository coordinates
        repo: RepoConfig,
        /// REST API base URL
        api_url: String,
        /// Bearer token, if any
        token: Option<String>,
        /// Names persisted as body markers beyond the registry's own
        comment_types: Vec<String>,
    },
}

/// Repository handles for one backend.
#[derive(Clone)]
pub struct Backend {
    /// Issue repository
    pub issues: Arc<dyn IssueRepository>,

    /// Link repository
    pub links: Arc<dyn LinkRepository>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend").finish_non_exhaustive()
    }
}

/// Create repositories for the given backend.
///
/// `registry` decides which relationship types the GitHub backend routes to
/// comment strategies.
///
/// # Errors
///
/// - `Error::Transport` if the HTTP client cannot be built
/// - `Error::Validation` if a configured comment type name is malformed
pub fn create_backend(backend: StorageBackend, registry: &RelationshipRegistry) -> Result<Backend> {
    match backend {
        StorageBackend::InMemory { prefix } => Ok(in_memory::new_in_memory_backend(prefix)),
        StorageBackend::GitHub {
            repo,
            api_url,
            token,
            comment_types,
        } => {
            let client: Arc<dyn GitHubApi> = Arc::new(RestGitHubClient::new(api_url, token)?);
            let router = StrategyRouter::for_registry(client.clone(), registry, comment_types)?;
            Ok(github::new_github_backend(client, repo, router))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_backend_shares_one_store() {
        let backend = create_backend(
            StorageBackend::InMemory {
                prefix: "mer".to_string(),
            },
            &RelationshipRegistry::with_defaults(),
        )
        .unwrap();

        let a = backend.issues.create(NewIssue::titled("A")).await.unwrap();
        let b = backend.issues.create(NewIssue::titled("B")).await.unwrap();
        let link = IssueLink::new(a.id.clone(), b.id.clone(), "blocks", chrono::Utc::now());
        backend.links.create(link).await.unwrap();

        assert_eq!(backend.links.list_by_issue(&b.id, None).await.unwrap().len(), 1);
    }

    #[test]
    fn test_github_backend_rejects_malformed_comment_type() {
        let result = create_backend(
            StorageBackend::GitHub {
                repo: RepoConfig::new("acme", "widgets"),
                api_url: crate::github::rest::DEFAULT_API_URL.to_string(),
                token: None,
                comment_types: vec!["has space".to_string()],
            },
            &RelationshipRegistry::with_defaults(),
        );
        assert!(result.is_err());
    }
}
