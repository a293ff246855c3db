//! MCP server implementation.
//!
//! This module contains the main server setup using rmcp.

use crate::context::Context;
use crate::models::{
    CreateIssueParams, IssueParams, LinkParams, ListLinksParams, RelationshipTypesParams,
    ReparentParams, SetContextParams, UnlinkParams,
};
use crate::tools::Tools;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::transport::stdio;
use rmcp::{
    ErrorData as McpError, ServiceExt, handler::server::ServerHandler, tool, tool_handler,
    tool_router,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// The meridian MCP server.
///
/// Provides MCP protocol handling over stdio transport.
#[derive(Clone)]
pub struct MeridianMcpServer {
    /// Shared context for workspace management.
    context: Arc<RwLock<Context>>,
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MeridianMcpServer {
    /// Set the workspace context for subsequent operations.
    #[tool(
        description = "Set the workspace root directory (or any directory inside it) for all subsequent operations. Call this first before using other tools."
    )]
    async fn set_context(
        &self,
        Parameters(params): Parameters<SetContextParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self.tools.set_context(&params.workspace_root).await?;
        Ok(CallToolResult::success(vec![Content::json(response)?]))
    }

    /// Get current workspace context information.
    #[tool(description = "Show current workspace context and backend. Useful for debugging.")]
    async fn where_am_i(&self) -> Result<CallToolResult, McpError> {
        let response = self.tools.where_am_i().await?;
        Ok(CallToolResult::success(vec![Content::json(response)?]))
    }

    /// List relationship types.
    #[tool(
        description = "List the relationship types that can be used with link, with their labels from each side."
    )]
    async fn relationship_types(
        &self,
        Parameters(params): Parameters<RelationshipTypesParams>,
    ) -> Result<CallToolResult, McpError> {
        let types = self
            .tools
            .relationship_types(params.workspace_root.as_deref())
            .await?;
        Ok(CallToolResult::success(vec![Content::json(types)?]))
    }

    /// Create a new issue.
    #[tool(description = "Create a new issue with a title and optional body.")]
    async fn create_issue(
        &self,
        Parameters(params): Parameters<CreateIssueParams>,
    ) -> Result<CallToolResult, McpError> {
        let issue = self
            .tools
            .create_issue(params.title, params.body, params.workspace_root.as_deref())
            .await?;
        Ok(CallToolResult::success(vec![Content::json(issue)?]))
    }

    /// Show an issue.
    #[tool(description = "Show an issue with its direct children and all links touching it.")]
    async fn show_issue(
        &self,
        Parameters(params): Parameters<IssueParams>,
    ) -> Result<CallToolResult, McpError> {
        let issue = self
            .tools
            .show_issue(&params.issue_id, params.workspace_root.as_deref())
            .await?;
        Ok(CallToolResult::success(vec![Content::json(issue)?]))
    }

    /// Link two issues.
    #[tool(
        description = "Link two issues with a relationship type (e.g. blocks, duplicates, relates-to). Symmetric types are stored once regardless of argument order."
    )]
    async fn link(
        &self,
        Parameters(params): Parameters<LinkParams>,
    ) -> Result<CallToolResult, McpError> {
        let link = self
            .tools
            .link(
                &params.source_issue_id,
                &params.target_issue_id,
                &params.link_type,
                params.workspace_root.as_deref(),
            )
            .await?;
        Ok(CallToolResult::success(vec![Content::json(link)?]))
    }

    /// Find the link between two issues.
    #[tool(description = "Look up the link of a given type between two issues. Returns null if none exists.")]
    async fn find_link(
        &self,
        Parameters(params): Parameters<LinkParams>,
    ) -> Result<CallToolResult, McpError> {
        let link = self
            .tools
            .find_link(
                &params.source_issue_id,
                &params.target_issue_id,
                &params.link_type,
                params.workspace_root.as_deref(),
            )
            .await?;
        Ok(CallToolResult::success(vec![Content::json(link)?]))
    }

    /// List links of an issue.
    #[tool(
        description = "List links touching an issue, labelled from its side (e.g. 'is blocked by'), optionally filtered by type."
    )]
    async fn list_links(
        &self,
        Parameters(params): Parameters<ListLinksParams>,
    ) -> Result<CallToolResult, McpError> {
        let links = self
            .tools
            .list_links(
                &params.issue_id,
                params.link_type.as_deref(),
                params.workspace_root.as_deref(),
            )
            .await?;
        Ok(CallToolResult::success(vec![Content::json(links)?]))
    }

    /// Remove a link.
    #[tool(description = "Remove a link by its id.")]
    async fn unlink(
        &self,
        Parameters(params): Parameters<UnlinkParams>,
    ) -> Result<CallToolResult, McpError> {
        let message = self
            .tools
            .unlink(&params.link_id, params.workspace_root.as_deref())
            .await?;
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    /// Delete an issue.
    #[tool(description = "Remove every link touching an issue, then delete the issue.")]
    async fn delete_issue(
        &self,
        Parameters(params): Parameters<IssueParams>,
    ) -> Result<CallToolResult, McpError> {
        let response = self
            .tools
            .delete_issue(&params.issue_id, params.workspace_root.as_deref())
            .await?;
        Ok(CallToolResult::success(vec![Content::json(response)?]))
    }

    /// Move an issue in the hierarchy.
    #[tool(
        description = "Place an issue under a new parent, or omit parent_id to make it a root. Rejects cycles and nesting deeper than three levels."
    )]
    async fn reparent(
        &self,
        Parameters(params): Parameters<ReparentParams>,
    ) -> Result<CallToolResult, McpError> {
        let issue = self
            .tools
            .reparent(
                &params.issue_id,
                params.parent_id.as_deref(),
                params.workspace_root.as_deref(),
            )
            .await?;
        Ok(CallToolResult::success(vec![Content::json(issue)?]))
    }
}

impl MeridianMcpServer {
    /// Create a new meridian MCP server.
    #[must_use]
    pub fn new() -> Self {
        let context = Arc::new(RwLock::new(Context::new()));
        let tools = Arc::new(Tools::new(Arc::clone(&context)));

        Self {
            context,
            tools,
            tool_router: Self::tool_router(),
        }
    }

    /// Get a reference to the context.
    #[must_use]
    pub fn context(&self) -> &Arc<RwLock<Context>> {
        &self.context
    }

    /// Discover a workspace above `start` and make it the current context.
    ///
    /// # Errors
    ///
    /// Returns an error if no workspace is found or its backend cannot be created.
    pub async fn with_workspace(self, start: &Path) -> crate::Result<Self> {
        self.context
            .write()
            .await
            .discover_and_set_workspace(start)
            .await?;
        Ok(self)
    }

    /// Serve over stdio until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to initialize or terminates abnormally.
    pub async fn run(self) -> anyhow::Result<()> {
        let service = self.serve(stdio()).await?;
        service.waiting().await?;
        Ok(())
    }
}

impl Default for MeridianMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for MeridianMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "meridian-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Meridian MCP server for issue relationships. Call set_context first to set the workspace."
                    .into(),
            ),
        }
    }
}
