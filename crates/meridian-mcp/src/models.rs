//! MCP request and response models.
//!
//! Parameter types derive `JsonSchema` so rmcp can publish tool input
//! schemas. Response types wrap or transform meridian domain types for MCP
//! compatibility.

use meridian::domain::{Issue, IssueLink, IssueState, ResolvedIssueLink};
use meridian::registry::RelationshipType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Tool parameters
// ============================================================================

/// Parameters for `set_context`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetContextParams {
    /// Workspace root, or any directory below it.
    pub workspace_root: String,
}

/// Parameters for `relationship_types`.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RelationshipTypesParams {
    /// Workspace to query (defaults to the current context).
    pub workspace_root: Option<String>,
}

/// Parameters for `create_issue`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateIssueParams {
    /// Issue title.
    pub title: String,

    /// Issue body.
    pub body: Option<String>,

    /// Workspace to write to (defaults to the current context).
    pub workspace_root: Option<String>,
}

/// Parameters for tools addressing a single issue.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct IssueParams {
    /// Issue id.
    pub issue_id: String,

    /// Workspace to use (defaults to the current context).
    pub workspace_root: Option<String>,
}

/// Parameters for `link` and `find_link`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LinkParams {
    /// Source issue id.
    pub source_issue_id: String,

    /// Target issue id.
    pub target_issue_id: String,

    /// Relationship type name (see `relationship_types`).
    pub link_type: String,

    /// Workspace to use (defaults to the current context).
    pub workspace_root: Option<String>,
}

/// Parameters for `list_links`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListLinksParams {
    /// Issue whose links to list.
    pub issue_id: String,

    /// Only links of this type.
    pub link_type: Option<String>,

    /// Workspace to use (defaults to the current context).
    pub workspace_root: Option<String>,
}

/// Parameters for `unlink`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UnlinkParams {
    /// Link id as returned by `link` or `list_links`.
    pub link_id: String,

    /// Workspace to use (defaults to the current context).
    pub workspace_root: Option<String>,
}

/// Parameters for `reparent`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReparentParams {
    /// Issue to move.
    pub issue_id: String,

    /// New parent; omit to make the issue a root.
    pub parent_id: Option<String>,

    /// Workspace to use (defaults to the current context).
    pub workspace_root: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Response from the `set_context` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetContextResponse {
    /// The workspace root that was set.
    pub workspace_root: String,

    /// Backend serving the workspace.
    pub backend: String,

    /// Status message.
    pub message: String,
}

/// Response from the `where_am_i` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WhereAmIResponse {
    /// The current workspace root, if set.
    pub workspace_root: Option<String>,

    /// Backend serving the current workspace, if set.
    pub backend: Option<String>,

    /// Whether a context is currently set.
    pub context_set: bool,
}

/// Issue representation for MCP responses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpIssue {
    /// Unique identifier.
    pub id: String,

    /// Backing-store local number.
    pub number: u64,

    /// Issue title.
    pub title: String,

    /// Issue body.
    pub body: Option<String>,

    /// `open` or `closed`.
    pub state: String,

    /// Parent issue id, if any.
    pub parent_id: Option<String>,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last update timestamp (ISO 8601).
    pub updated_at: String,
}

impl From<Issue> for McpIssue {
    fn from(issue: Issue) -> Self {
        Self {
            id: issue.id.to_string(),
            number: issue.number,
            title: issue.title,
            body: issue.body,
            state: state_to_string(issue.state),
            parent_id: issue.parent_id.map(|p| p.to_string()),
            created_at: issue.created_at.to_rfc3339(),
            updated_at: issue.updated_at.to_rfc3339(),
        }
    }
}

/// A stored link.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpLink {
    /// Link id.
    pub id: String,

    /// Source issue id.
    pub source_issue_id: String,

    /// Target issue id.
    pub target_issue_id: String,

    /// Relationship type name.
    pub link_type: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

impl From<IssueLink> for McpLink {
    fn from(link: IssueLink) -> Self {
        Self {
            id: link.id.to_string(),
            source_issue_id: link.source_issue_id.to_string(),
            target_issue_id: link.target_issue_id.to_string(),
            link_type: link.link_type,
            created_at: link.created_at.to_rfc3339(),
        }
    }
}

/// A link as seen from one issue.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpResolvedLink {
    /// Link id.
    pub id: String,

    /// The issue at the other end.
    pub linked_issue_id: String,

    /// Relationship type name.
    pub link_type: String,

    /// Label from the viewing issue's side (e.g. "is blocked by").
    pub label: String,

    /// `outgoing` or `incoming`.
    pub direction: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

impl From<ResolvedIssueLink> for McpResolvedLink {
    fn from(link: ResolvedIssueLink) -> Self {
        Self {
            id: link.id.to_string(),
            linked_issue_id: link.linked_issue_id.to_string(),
            link_type: link.link_type,
            label: link.label,
            direction: link.direction.to_string(),
            created_at: link.created_at.to_rfc3339(),
        }
    }
}

/// A registered relationship type.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct McpRelationshipType {
    /// Type name used in `link`.
    pub name: String,

    /// Label from the source.
    pub forward_label: String,

    /// Label from the target.
    pub inverse_label: String,

    /// Whether direction is irrelevant.
    pub symmetric: bool,
}

impl From<&RelationshipType> for McpRelationshipType {
    fn from(rel: &RelationshipType) -> Self {
        Self {
            name: rel.name.clone(),
            forward_label: rel.forward_label.clone(),
            inverse_label: rel.inverse_label.clone(),
            symmetric: rel.symmetric,
        }
    }
}

/// Response from the `show_issue` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShowIssueResponse {
    /// The issue.
    pub issue: McpIssue,

    /// Direct children.
    pub children: Vec<McpIssue>,

    /// Links touching the issue.
    pub links: Vec<McpResolvedLink>,
}

/// Response from the `delete_issue` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteIssueResponse {
    /// The deleted issue.
    pub issue_id: String,

    /// Number of links purged before deletion.
    pub removed_links: usize,
}

fn state_to_string(state: IssueState) -> String {
    match state {
        IssueState::Open => "open".to_string(),
        IssueState::Closed => "closed".to_string(),
    }
}
