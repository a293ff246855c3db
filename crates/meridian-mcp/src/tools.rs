//! MCP tool implementations.
//!
//! This module contains the implementations for all MCP tools exposed by the server.

use crate::context::{Context, Workspace};
use crate::error::Result;
use crate::models::{
    DeleteIssueResponse, McpIssue, McpLink, McpRelationshipType, McpResolvedLink,
    SetContextResponse, ShowIssueResponse, WhereAmIResponse,
};
use meridian::domain::{IssueId, LinkId, NewIssue};
use meridian::error::Error as DomainError;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Tool implementations for the meridian MCP server.
pub struct Tools {
    context: Arc<RwLock<Context>>,
}

impl Tools {
    /// Create a new Tools instance with the given context.
    pub fn new(context: Arc<RwLock<Context>>) -> Self {
        Self { context }
    }

    /// Resolve the workspace, releasing the context lock before returning.
    async fn workspace(&self, workspace_root: Option<&str>) -> Result<Arc<Workspace>> {
        let context = self.context.read().await;
        context.workspace_for(workspace_root.map(Path::new))
    }

    /// Set the workspace context.
    ///
    /// `workspace_root` may be any directory inside the workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid, has no `.meridian/` directory
    /// above it, or its configuration cannot be loaded.
    pub async fn set_context(&self, workspace_root: &str) -> Result<SetContextResponse> {
        let path = Path::new(workspace_root);
        let mut context = self.context.write().await;
        let info = context.discover_and_set_workspace(path).await?;

        Ok(SetContextResponse {
            workspace_root: info.workspace_root.display().to_string(),
            backend: info.backend,
            message: "Context set successfully".to_string(),
        })
    }

    /// Get current workspace information.
    ///
    /// # Errors
    ///
    /// This function does not currently return errors but returns `Result` for API consistency.
    pub async fn where_am_i(&self) -> Result<WhereAmIResponse> {
        let context = self.context.read().await;

        let Some(root) = context.current_workspace() else {
            return Ok(WhereAmIResponse {
                workspace_root: None,
                backend: None,
                context_set: false,
            });
        };
        let backend = context
            .workspace_for(None)
            .ok()
            .map(|ws| ws.backend_name.clone());

        Ok(WhereAmIResponse {
            workspace_root: Some(root.display().to_string()),
            backend,
            context_set: true,
        })
    }

    /// List the registered relationship types.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set.
    pub async fn relationship_types(
        &self,
        workspace_root: Option<&str>,
    ) -> Result<Vec<McpRelationshipType>> {
        let workspace = self.workspace(workspace_root).await?;
        Ok(workspace.registry().iter().map(Into::into).collect())
    }

    /// Create a new issue.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, validation fails, or storage operations fail.
    pub async fn create_issue(
        &self,
        title: String,
        body: Option<String>,
        workspace_root: Option<&str>,
    ) -> Result<McpIssue> {
        let workspace = self.workspace(workspace_root).await?;
        let issue = workspace
            .backend
            .issues
            .create(NewIssue { title, body })
            .await?;
        Ok(issue.into())
    }

    /// Show an issue with its children and links.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set, the issue doesn't exist, or
    /// storage operations fail.
    pub async fn show_issue(
        &self,
        issue_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<ShowIssueResponse> {
        let workspace = self.workspace(workspace_root).await?;
        let id = IssueId::new(issue_id);

        let issue = workspace
            .backend
            .issues
            .get(&id)
            .await?
            .ok_or_else(|| DomainError::issue_not_found(issue_id))?;
        let children = workspace.backend.issues.children(&id).await?;
        let links = workspace.links.list(&id, None).await?;

        Ok(ShowIssueResponse {
            issue: issue.into(),
            children: children.into_iter().map(Into::into).collect(),
            links: links.into_iter().map(Into::into).collect(),
        })
    }

    /// Link two issues.
    ///
    /// # Errors
    ///
    /// Returns an error for self-links, unknown types, missing issues and
    /// existing links.
    pub async fn link(
        &self,
        source_issue_id: &str,
        target_issue_id: &str,
        link_type: &str,
        workspace_root: Option<&str>,
    ) -> Result<McpLink> {
        let workspace = self.workspace(workspace_root).await?;
        let link = workspace
            .links
            .create(
                &IssueId::new(source_issue_id),
                &IssueId::new(target_issue_id),
                link_type,
            )
            .await?;
        Ok(link.into())
    }

    /// Look up the link between two issues.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown types or storage failures.
    pub async fn find_link(
        &self,
        source_issue_id: &str,
        target_issue_id: &str,
        link_type: &str,
        workspace_root: Option<&str>,
    ) -> Result<Option<McpLink>> {
        let workspace = self.workspace(workspace_root).await?;
        let link = workspace
            .links
            .find(
                &IssueId::new(source_issue_id),
                &IssueId::new(target_issue_id),
                link_type,
            )
            .await?;
        Ok(link.map(Into::into))
    }

    /// List links touching an issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the issue doesn't exist or storage operations fail.
    pub async fn list_links(
        &self,
        issue_id: &str,
        link_type: Option<&str>,
        workspace_root: Option<&str>,
    ) -> Result<Vec<McpResolvedLink>> {
        let workspace = self.workspace(workspace_root).await?;
        let links = workspace
            .links
            .list(&IssueId::new(issue_id), link_type)
            .await?;
        Ok(links.into_iter().map(Into::into).collect())
    }

    /// Remove a link by id.
    ///
    /// # Errors
    ///
    /// Returns an error if no link has this id.
    pub async fn unlink(&self, link_id: &str, workspace_root: Option<&str>) -> Result<String> {
        let workspace = self.workspace(workspace_root).await?;
        workspace.links.delete(&LinkId::new(link_id)).await?;
        Ok(format!("Removed link {link_id}"))
    }

    /// Purge an issue's links, then delete it.
    ///
    /// # Errors
    ///
    /// Returns an error if the issue doesn't exist or storage operations fail.
    pub async fn delete_issue(
        &self,
        issue_id: &str,
        workspace_root: Option<&str>,
    ) -> Result<DeleteIssueResponse> {
        let workspace = self.workspace(workspace_root).await?;
        let removed_links = workspace
            .links
            .delete_issue(&IssueId::new(issue_id))
            .await?;
        Ok(DeleteIssueResponse {
            issue_id: issue_id.to_string(),
            removed_links,
        })
    }

    /// Move an issue under a new parent, or make it a root.
    ///
    /// # Errors
    ///
    /// Returns an error if either issue doesn't exist, or the move would
    /// create a cycle or exceed the maximum depth.
    pub async fn reparent(
        &self,
        issue_id: &str,
        parent_id: Option<&str>,
        workspace_root: Option<&str>,
    ) -> Result<McpIssue> {
        let workspace = self.workspace(workspace_root).await?;
        let parent = parent_id.map(IssueId::new);
        let issue = workspace
            .hierarchy
            .reparent(&IssueId::new(issue_id), parent.as_ref())
            .await?;
        Ok(issue.into())
    }
}
