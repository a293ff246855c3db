//! Issue link use cases.

use crate::domain::{IssueId, IssueLink, LinkId, ResolvedIssueLink};
use crate::error::{Error, Result};
use crate::registry::RelationshipRegistry;
use crate::storage::{Backend, IssueRepository, LinkRepository};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Creates, reads and removes links between issues.
///
/// Link rules live here rather than in the repositories:
///
/// - an issue cannot link to itself
/// - the type must be registered
/// - both endpoints must exist
/// - symmetric links are stored with the smaller id as source, so A→B and
///   B→A are the same link
#[derive(Clone)]
pub struct LinkService {
    issues: Arc<dyn IssueRepository>,
    links: Arc<dyn LinkRepository>,
    registry: Arc<RelationshipRegistry>,
}

impl std::fmt::Debug for LinkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkService")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl LinkService {
    /// Create a service over explicit repositories.
    pub fn new(
        issues: Arc<dyn IssueRepository>,
        links: Arc<dyn LinkRepository>,
        registry: Arc<RelationshipRegistry>,
    ) -> Self {
        Self {
            issues,
            links,
            registry,
        }
    }

    /// Create a service over a backend's repositories.
    pub fn for_backend(backend: &Backend, registry: Arc<RelationshipRegistry>) -> Self {
        Self::new(backend.issues.clone(), backend.links.clone(), registry)
    }

    /// The registry this service validates against.
    #[must_use]
    pub fn registry(&self) -> &RelationshipRegistry {
        &self.registry
    }

    async fn ensure_exists(&self, id: &IssueId) -> Result<()> {
        match self.issues.get(id).await? {
            Some(_) => Ok(()),
            None => Err(Error::issue_not_found(id.as_str())),
        }
    }

    /// Canonical `(source, target)` order for `link_type`.
    fn normalize<'a>(
        &self,
        source: &'a IssueId,
        target: &'a IssueId,
        link_type: &str,
    ) -> (&'a IssueId, &'a IssueId) {
        if self.registry.is_symmetric(link_type) && target < source {
            (target, source)
        } else {
            (source, target)
        }
    }

    /// Link `source` to `target` with `link_type`.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    ///
    /// - `Error::Validation` if `source == target`
    /// - `Error::UnknownRelationshipType` if the type is not registered
    /// - `Error::NotFound` if either issue doesn't exist
    /// - `Error::Conflict` if the (normalized) link already exists
    pub async fn create(
        &self,
        source: &IssueId,
        target: &IssueId,
        link_type: &str,
    ) -> Result<IssueLink> {
        if source == target {
            return Err(Error::validation(
                "target_issue_id",
                format!("issue {source} cannot be linked to itself"),
            ));
        }
        self.registry.require(link_type)?;
        self.ensure_exists(source).await?;
        self.ensure_exists(target).await?;

        let (source, target) = self.normalize(source, target, link_type);
        if self.links.find(source, target, link_type).await?.is_some() {
            return Err(Error::Conflict(format!(
                "{source} already {link_type} {target}"
            )));
        }

        let link = IssueLink::new(source.clone(), target.clone(), link_type, Utc::now());
        let stored = self.links.create(link).await?;
        info!(
            link_id = %stored.id,
            source = %stored.source_issue_id,
            target = %stored.target_issue_id,
            link_type,
            "Created link"
        );
        Ok(stored)
    }

    /// Look up a link by id.
    ///
    /// # Errors
    ///
    /// Propagates repository failures; a missing link is `Ok(None)`.
    pub async fn find_by_id(&self, id: &LinkId) -> Result<Option<IssueLink>> {
        self.links.find_by_id(id).await
    }

    /// Look up the link between two issues, normalizing symmetric types.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownRelationshipType` for an unregistered type.
    pub async fn find(
        &self,
        source: &IssueId,
        target: &IssueId,
        link_type: &str,
    ) -> Result<Option<IssueLink>> {
        self.registry.require(link_type)?;
        let (source, target) = self.normalize(source, target, link_type);
        self.links.find(source, target, link_type).await
    }

    /// Links touching `issue`, labelled from its point of view.
    ///
    /// Ordered by creation time, then id.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the issue doesn't exist.
    pub async fn list(
        &self,
        issue: &IssueId,
        link_type: Option<&str>,
    ) -> Result<Vec<ResolvedIssueLink>> {
        self.ensure_exists(issue).await?;

        let mut resolved: Vec<ResolvedIssueLink> = self
            .links
            .list_by_issue(issue, link_type)
            .await?
            .into_iter()
            .map(|link| ResolvedIssueLink {
                label: self.registry.label_for(issue, &link),
                direction: RelationshipRegistry::direction_for(issue, &link),
                linked_issue_id: link.other_end(issue).clone(),
                id: link.id,
                link_type: link.link_type,
                created_at: link.created_at,
            })
            .collect();
        resolved.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(resolved)
    }

    /// Remove one link.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no link has this id.
    pub async fn delete(&self, id: &LinkId) -> Result<()> {
        if !self.links.delete(id).await? {
            return Err(Error::link_not_found(id.as_str()));
        }
        info!(link_id = %id, "Deleted link");
        Ok(())
    }

    /// Remove every link touching `issue`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Propagates repository failures.
    pub async fn delete_by_issue_id(&self, issue: &IssueId) -> Result<usize> {
        let removed = self.links.delete_by_issue_id(issue).await?;
        debug!(issue_id = %issue, removed, "Purged links");
        Ok(removed)
    }

    /// Purge an issue's links, then delete the issue.
    ///
    /// Returns the number of links removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the issue doesn't exist.
    pub async fn delete_issue(&self, issue: &IssueId) -> Result<usize> {
        self.ensure_exists(issue).await?;
        let removed = self.delete_by_issue_id(issue).await?;
        self.issues.delete(issue).await?;
        info!(issue_id = %issue, removed_links = removed, "Deleted issue");
        Ok(removed)
    }
}
