//! Domain types for issue relationships.
//!
//! This module contains the core domain types shared by every backing store:
//! issues, links between them, and the read models produced for display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an issue
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IssueId(pub String);

impl IssueId {
    /// Create a new issue ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IssueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IssueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for a link, derived from its endpoints and type
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkId(pub String);

impl LinkId {
    /// Create a new link ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LinkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// State of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    /// Issue is open
    Open,

    /// Issue has been closed
    Closed,
}

/// Represents an issue in the tracking system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable domain identifier
    pub id: IssueId,

    /// The backing store's local issue number
    pub number: u64,

    /// Issue title
    pub title: String,

    /// Free-text body; link markers for comment-backed types live here
    pub body: Option<String>,

    /// Current state
    pub state: IssueState,

    /// Parent issue in the hierarchy, if any
    pub parent_id: Option<IssueId>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Data for creating a new issue
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    /// Issue title
    pub title: String,

    /// Issue body
    pub body: Option<String>,
}

impl NewIssue {
    /// Create a new issue payload with the given title and no body
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
        }
    }
}

/// Maximum title length accepted by [`NewIssue::validate`].
pub const MAX_TITLE_LENGTH: usize = 256;

impl NewIssue {
    /// Validate the payload before it reaches a backing store.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the title is empty or longer than
    /// [`MAX_TITLE_LENGTH`] characters.
    pub fn validate(&self) -> crate::error::Result<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(crate::error::Error::validation(
                "title",
                "title cannot be empty",
            ));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(crate::error::Error::validation(
                "title",
                format!("title cannot exceed {MAX_TITLE_LENGTH} characters"),
            ));
        }
        Ok(())
    }
}

/// Filter for querying issues
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    /// Filter by state
    pub state: Option<IssueState>,

    /// Only issues whose parent is this issue
    pub parent_id: Option<IssueId>,

    /// Limit number of results
    pub limit: Option<usize>,
}

impl IssueFilter {
    /// Whether the issue satisfies every criterion except `limit`.
    #[must_use]
    pub fn matches(&self, issue: &Issue) -> bool {
        if let Some(state) = self.state {
            if issue.state != state {
                return false;
            }
        }
        if let Some(ref parent) = self.parent_id {
            if issue.parent_id.as_ref() != Some(parent) {
                return false;
            }
        }
        true
    }
}

/// A directed edge between two issues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLink {
    /// Stable identifier derived from source, type, and target
    pub id: LinkId,

    /// Issue the link points from
    pub source_issue_id: IssueId,

    /// Issue the link points to
    pub target_issue_id: IssueId,

    /// Relationship type name (key into the registry)
    pub link_type: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl IssueLink {
    /// Build a link with its derived identifier.
    pub fn new(
        source_issue_id: IssueId,
        target_issue_id: IssueId,
        link_type: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let link_type = link_type.into();
        let id = crate::ids::link_id(&source_issue_id, &link_type, &target_issue_id);
        Self {
            id,
            source_issue_id,
            target_issue_id,
            link_type,
            created_at,
        }
    }

    /// Whether the given issue is one of the endpoints.
    #[must_use]
    pub fn touches(&self, issue_id: &IssueId) -> bool {
        &self.source_issue_id == issue_id || &self.target_issue_id == issue_id
    }

    /// The endpoint that is not `viewing`.
    #[must_use]
    pub fn other_end(&self, viewing: &IssueId) -> &IssueId {
        if &self.source_issue_id == viewing {
            &self.target_issue_id
        } else {
            &self.source_issue_id
        }
    }
}

/// Direction of a link relative to the viewing issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    /// The viewing issue is the source
    Outgoing,

    /// The viewing issue is the target
    Incoming,
}

impl fmt::Display for LinkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outgoing => write!(f, "outgoing"),
            Self::Incoming => write!(f, "incoming"),
        }
    }
}

/// A link presented from the viewpoint of one issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIssueLink {
    /// Link identifier
    pub id: LinkId,

    /// The issue on the other end
    pub linked_issue_id: IssueId,

    /// Relationship type name
    pub link_type: String,

    /// Forward or inverse label, depending on direction
    pub label: String,

    /// Direction relative to the viewing issue
    pub direction: LinkDirection,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Repository coordinates on the backing store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Repository owner (user or organization)
    pub owner: String,

    /// Repository name
    pub repo: String,
}

impl RepoConfig {
    /// Create repository coordinates
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// An edge as read back from a persistence strategy.
///
/// `issue_number` is the backing store's local number of the *other*
/// endpoint. When `reversed` is set the edge was discovered from its target
/// side, so the queried issue is the domain-level target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedNativeLink {
    /// Relationship type name
    pub link_type: String,

    /// Owner of the other endpoint's repository
    pub owner: String,

    /// Name of the other endpoint's repository
    pub repo: String,

    /// Local number of the other endpoint
    pub issue_number: u64,

    /// Edge discovered from the target side
    pub reversed: bool,
}

impl ParsedNativeLink {
    /// An outgoing edge to `issue_number` in `repo`.
    pub fn outgoing(link_type: impl Into<String>, repo: &RepoConfig, issue_number: u64) -> Self {
        Self {
            link_type: link_type.into(),
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
            issue_number,
            reversed: false,
        }
    }

    /// Whether the other endpoint lives in `repo`.
    #[must_use]
    pub fn is_in(&self, repo: &RepoConfig) -> bool {
        self.owner.eq_ignore_ascii_case(&repo.owner) && self.repo.eq_ignore_ascii_case(&repo.repo)
    }
}
