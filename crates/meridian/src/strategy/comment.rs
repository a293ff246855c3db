//! Comment-fallback links.
//!
//! Types without a native GitHub counterpart are stored as markers in the
//! source issue's body (see [`crate::codec`]). Each instance serves exactly
//! one type name.
//!
//! Writes are an unguarded read-modify-write of the whole body: two
//! concurrent creates on the same source issue can both read the old body,
//! and the second write discards the first marker.

use crate::codec;
use crate::domain::{ParsedNativeLink, RepoConfig};
use crate::error::Result;
use crate::github::{GitHubApi, NotFoundMeans};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Persists one relationship type as body markers.
#[derive(Clone)]
pub struct CommentStrategy {
    client: Arc<dyn GitHubApi>,
    link_type: String,
}

impl fmt::Debug for CommentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommentStrategy")
            .field("link_type", &self.link_type)
            .finish_non_exhaustive()
    }
}

impl CommentStrategy {
    /// Create a strategy for `link_type` over `client`.
    pub fn new(client: Arc<dyn GitHubApi>, link_type: impl Into<String>) -> Self {
        Self {
            client,
            link_type: link_type.into(),
        }
    }

    /// The relationship type this instance serves.
    #[must_use]
    pub fn link_type(&self) -> &str {
        &self.link_type
    }

    fn is_edge_to(&self, link: &ParsedNativeLink, repo: &RepoConfig, target: u64) -> bool {
        link.link_type == self.link_type && link.issue_number == target && link.is_in(repo)
    }

    async fn read_body(&self, number: u64, repo: &RepoConfig) -> Result<Option<String>> {
        self.client
            .get_issue(repo, number)
            .await
            .map(|issue| issue.body)
            .map_err(|e| e.into_domain(NotFoundMeans::issue(number)))
    }

    async fn write_body(&self, number: u64, repo: &RepoConfig, body: &str) -> Result<()> {
        self.client
            .update_issue_body(repo, number, body)
            .await
            .map(|_| ())
            .map_err(|e| e.into_domain(NotFoundMeans::issue(number)))
    }

    /// Append a marker for `source → target` to the source's body.
    ///
    /// Nothing is written when the marker is already present.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `source` does not exist, or the mapped
    /// backing-store error from the read or the write.
    pub async fn create_link(&self, source: u64, target: u64, repo: &RepoConfig) -> Result<()> {
        let body = self.read_body(source, repo).await?;
        let mut links = codec::parse(body.as_deref(), repo);

        if links.iter().any(|link| self.is_edge_to(link, repo, target)) {
            debug!(link_type = %self.link_type, source, target, "Marker already present");
            return Ok(());
        }

        links.push(ParsedNativeLink::outgoing(&self.link_type, repo, target));
        let updated = codec::compose(body.as_deref(), &links);
        debug!(link_type = %self.link_type, source, target, "Writing link marker");
        self.write_body(source, repo, &updated).await
    }

    /// Drop the marker for `source → target` from the source's body.
    ///
    /// Nothing is written when no marker matched.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `source` does not exist, or the mapped
    /// backing-store error from the read or the write.
    pub async fn delete_link(&self, source: u64, target: u64, repo: &RepoConfig) -> Result<()> {
        let body = self.read_body(source, repo).await?;
        let links = codec::parse(body.as_deref(), repo);
        let before = links.len();
        let remaining: Vec<_> = links
            .into_iter()
            .filter(|link| !self.is_edge_to(link, repo, target))
            .collect();

        if remaining.len() == before {
            debug!(link_type = %self.link_type, source, target, "No marker to remove");
            return Ok(());
        }

        let updated = codec::compose(body.as_deref(), &remaining);
        debug!(link_type = %self.link_type, source, target, "Removing link marker");
        self.write_body(source, repo, &updated).await
    }

    /// Markers of this type in the body of `number`.
    ///
    /// Only outgoing edges are visible here; incoming comment links live in
    /// other issues' bodies.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `number` does not exist, or the mapped
    /// backing-store error.
    pub async fn find_links_by_issue(
        &self,
        number: u64,
        repo: &RepoConfig,
    ) -> Result<Vec<ParsedNativeLink>> {
        let body = self.read_body(number, repo).await?;
        Ok(codec::parse(body.as_deref(), repo)
            .into_iter()
            .filter(|link| link.link_type == self.link_type)
            .collect())
    }
}
