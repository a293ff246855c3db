//! Integration tests for meridian-mcp tools.
//!
//! These tests exercise the MCP tools against real workspaces on disk (a
//! `.meridian/config.yaml` selecting the in-memory backend) to verify:
//! - Context discovery and switching
//! - Link and hierarchy use cases end to end
//! - Error mapping to protocol codes

use meridian::config::{self, MeridianConfig, RelationshipTypeConfig};
use meridian_mcp::context::Context;
use meridian_mcp::error::Error;
use meridian_mcp::models::McpIssue;
use meridian_mcp::tools::Tools;
use rmcp::ErrorData as McpError;
use rmcp::model::ErrorCode;
use rstest::rstest;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::RwLock;

mod helpers {
    use super::*;
    use std::path::Path;

    /// Create a temporary workspace with the given configuration.
    pub async fn create_workspace(config: &MeridianConfig) -> TempDir {
        let temp = TempDir::new().expect("Failed to create temp dir");
        config::init(temp.path(), config)
            .await
            .expect("Failed to initialize workspace");
        temp
    }

    /// Create a temporary in-memory workspace with prefix `test`.
    pub async fn create_temp_workspace() -> TempDir {
        create_workspace(&MeridianConfig::new("test")).await
    }

    /// Create Tools instance with empty context.
    pub fn create_tools() -> Tools {
        Tools::new(Arc::new(RwLock::new(Context::new())))
    }

    /// Set the tools context to the given workspace path.
    pub async fn set_context(tools: &Tools, path: &Path) {
        tools
            .set_context(&path.display().to_string())
            .await
            .expect("set_context should succeed");
    }

    /// Create an issue and return it.
    pub async fn create_issue(tools: &Tools, title: &str) -> McpIssue {
        tools
            .create_issue(title.to_string(), None, None)
            .await
            .expect("create_issue should succeed")
    }

    /// Protocol error code for a failed tool call.
    pub fn code_of(err: Error) -> ErrorCode {
        McpError::from(err).code
    }
}

use helpers::*;

// ============================================================================
// Context
// ============================================================================

#[tokio::test]
async fn test_tools_require_context() {
    let tools = create_tools();

    let where_am_i = tools.where_am_i().await.unwrap();
    assert!(!where_am_i.context_set);

    let err = tools.create_issue("x".to_string(), None, None).await.unwrap_err();
    assert!(matches!(err, Error::NoContext));
    assert_eq!(code_of(err), ErrorCode::INVALID_REQUEST);
}

#[tokio::test]
async fn test_set_context_from_subdirectory() {
    let workspace = create_temp_workspace().await;
    let nested = workspace.path().join("src").join("deep");
    std::fs::create_dir_all(&nested).unwrap();
    let tools = create_tools();

    let response = tools
        .set_context(&nested.display().to_string())
        .await
        .unwrap();
    assert_eq!(
        response.workspace_root,
        workspace.path().canonicalize().unwrap().display().to_string()
    );
    assert_eq!(response.backend, "memory");

    let where_am_i = tools.where_am_i().await.unwrap();
    assert!(where_am_i.context_set);
    assert_eq!(where_am_i.backend.as_deref(), Some("memory"));
}

#[tokio::test]
async fn test_set_context_without_workspace() {
    let temp = TempDir::new().unwrap();
    let tools = create_tools();

    let err = tools
        .set_context(&temp.path().display().to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoMeridianDirectory(_)));
}

#[tokio::test]
async fn test_workspaces_are_isolated() {
    let first = create_temp_workspace().await;
    let second = create_temp_workspace().await;
    let tools = create_tools();

    set_context(&tools, first.path()).await;
    let issue = create_issue(&tools, "Only in first").await;

    set_context(&tools, second.path()).await;
    let err = tools.show_issue(&issue.id, None).await.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::RESOURCE_NOT_FOUND);

    // Explicit workspace_root reaches the first workspace again
    let first_root = first.path().display().to_string();
    let shown = tools.show_issue(&issue.id, Some(&first_root)).await.unwrap();
    assert_eq!(shown.issue.title, "Only in first");
}

// ============================================================================
// Relationship types
// ============================================================================

#[tokio::test]
async fn test_relationship_types_include_configured() {
    let mut config = MeridianConfig::new("test");
    config.relationship_types.push(RelationshipTypeConfig {
        name: "caused-by".to_string(),
        forward_label: "was caused by".to_string(),
        inverse_label: Some("caused".to_string()),
        symmetric: false,
    });
    let workspace = create_workspace(&config).await;
    let tools = create_tools();
    set_context(&tools, workspace.path()).await;

    let types = tools.relationship_types(None).await.unwrap();
    let names: Vec<_> = types.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["blocks", "caused-by", "duplicates", "relates-to"]);

    let relates = types.iter().find(|t| t.name == "relates-to").unwrap();
    assert!(relates.symmetric);
}

// ============================================================================
// Links
// ============================================================================

#[tokio::test]
async fn test_link_lifecycle() {
    let workspace = create_temp_workspace().await;
    let tools = create_tools();
    set_context(&tools, workspace.path()).await;

    let blocker = create_issue(&tools, "Blocker").await;
    let blocked = create_issue(&tools, "Blocked").await;

    let link = tools
        .link(&blocker.id, &blocked.id, "blocks", None)
        .await
        .unwrap();
    assert_eq!(link.source_issue_id, blocker.id);

    let from_blocked = tools.list_links(&blocked.id, None, None).await.unwrap();
    assert_eq!(from_blocked.len(), 1);
    assert_eq!(from_blocked[0].label, "is blocked by");
    assert_eq!(from_blocked[0].direction, "incoming");
    assert_eq!(from_blocked[0].linked_issue_id, blocker.id);

    let found = tools
        .find_link(&blocker.id, &blocked.id, "blocks", None)
        .await
        .unwrap();
    assert_eq!(found.map(|l| l.id), Some(link.id.clone()));

    tools.unlink(&link.id, None).await.unwrap();
    assert!(tools.list_links(&blocked.id, None, None).await.unwrap().is_empty());

    let err = tools.unlink(&link.id, None).await.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::RESOURCE_NOT_FOUND);
}

#[rstest]
#[case::self_link(true, "blocks")]
#[case::unknown_type(false, "clones")]
#[tokio::test]
async fn test_invalid_link_is_invalid_params(#[case] same_issue: bool, #[case] link_type: &str) {
    let workspace = create_temp_workspace().await;
    let tools = create_tools();
    set_context(&tools, workspace.path()).await;

    let a = create_issue(&tools, "A").await;
    let b = create_issue(&tools, "B").await;
    let target = if same_issue { &a.id } else { &b.id };

    let err = tools.link(&a.id, target, link_type, None).await.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::INVALID_PARAMS);
}

#[tokio::test]
async fn test_symmetric_link_created_once() {
    let workspace = create_temp_workspace().await;
    let tools = create_tools();
    set_context(&tools, workspace.path()).await;

    let a = create_issue(&tools, "A").await;
    let b = create_issue(&tools, "B").await;

    tools.link(&a.id, &b.id, "relates-to", None).await.unwrap();
    let err = tools.link(&b.id, &a.id, "relates-to", None).await.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::INVALID_PARAMS);

    let from_b = tools.list_links(&b.id, None, None).await.unwrap();
    assert_eq!(from_b.len(), 1);
    assert_eq!(from_b[0].label, "relates to");
}

#[tokio::test]
async fn test_delete_issue_reports_purged_links() {
    let workspace = create_temp_workspace().await;
    let tools = create_tools();
    set_context(&tools, workspace.path()).await;

    let a = create_issue(&tools, "A").await;
    let b = create_issue(&tools, "B").await;
    let c = create_issue(&tools, "C").await;
    tools.link(&a.id, &b.id, "blocks", None).await.unwrap();
    tools.link(&c.id, &b.id, "duplicates", None).await.unwrap();
    tools.link(&a.id, &c.id, "relates-to", None).await.unwrap();

    let response = tools.delete_issue(&b.id, None).await.unwrap();
    assert_eq!(response.removed_links, 2);

    let remaining = tools.list_links(&a.id, None, None).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].linked_issue_id, c.id);
}

// ============================================================================
// Hierarchy
// ============================================================================

#[tokio::test]
async fn test_reparent_and_show_children() {
    let workspace = create_temp_workspace().await;
    let tools = create_tools();
    set_context(&tools, workspace.path()).await;

    let epic = create_issue(&tools, "Epic").await;
    let story = create_issue(&tools, "Story").await;

    let moved = tools.reparent(&story.id, Some(&epic.id), None).await.unwrap();
    assert_eq!(moved.parent_id.as_deref(), Some(epic.id.as_str()));

    let shown = tools.show_issue(&epic.id, None).await.unwrap();
    assert_eq!(shown.children.len(), 1);
    assert_eq!(shown.children[0].id, story.id);

    let err = tools.reparent(&epic.id, Some(&story.id), None).await.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::INVALID_PARAMS);

    let cleared = tools.reparent(&story.id, None, None).await.unwrap();
    assert_eq!(cleared.parent_id, None);
}

#[tokio::test]
async fn test_reparent_depth_limit() {
    let workspace = create_temp_workspace().await;
    let tools = create_tools();
    set_context(&tools, workspace.path()).await;

    let mut ids = Vec::new();
    for title in ["L0", "L1", "L2", "L3", "L4"] {
        ids.push(create_issue(&tools, title).await.id);
    }
    for pair in ids[..4].windows(2) {
        tools.reparent(&pair[1], Some(&pair[0]), None).await.unwrap();
    }

    let err = tools.reparent(&ids[4], Some(&ids[3]), None).await.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::INVALID_PARAMS);
}
