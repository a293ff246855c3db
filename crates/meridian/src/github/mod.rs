//! GitHub backing-store seam.
//!
//! [`GitHubApi`] is the narrow set of REST calls the strategies and the
//! GitHub repositories consume. [`RestGitHubClient`] implements it over
//! `reqwest`; [`FakeGitHub`] (behind the `test-util` feature) implements it
//! in memory for tests.
//!
//! Calls return [`ApiResult`], never the domain error directly: only the
//! caller knows whether a 404 means a missing issue or a disabled feature,
//! so translation happens at the call site through
//! [`ApiError::into_domain`].

use crate::domain::RepoConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod rest;
pub mod status;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

#[cfg(any(test, feature = "test-util"))]
pub use fake::{FakeGitHub, FakeOp};
pub use rest::RestGitHubClient;
pub use status::{ApiError, ApiResult, ApiStatus, NotFoundMeans};

/// Page size used when listing every issue of a repository.
pub const PAGE_SIZE: u8 = 100;

/// An issue as returned by the GitHub REST API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubIssue {
    /// Database identifier (the "internal id" relationship endpoints take)
    pub id: u64,

    /// GraphQL node identifier (used as the domain issue id)
    pub node_id: String,

    /// Repository-local issue number
    pub number: u64,

    /// Issue title
    pub title: String,

    /// Issue body
    #[serde(default)]
    pub body: Option<String>,

    /// `open` or `closed`
    pub state: String,

    /// Why a closed issue was closed (`completed`, `not_planned`, ...)
    #[serde(default)]
    pub state_reason: Option<String>,

    /// API URL of the owning repository
    #[serde(default)]
    pub repository_url: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Present when the "issue" is a pull request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl GitHubIssue {
    /// Repository this issue belongs to, read from `repository_url`.
    ///
    /// Falls back to `fallback` when the URL is absent or malformed.
    #[must_use]
    pub fn repo_or(&self, fallback: &RepoConfig) -> RepoConfig {
        self.repository_url
            .as_deref()
            .and_then(parse_repository_url)
            .unwrap_or_else(|| fallback.clone())
    }

    /// Whether this entry is a pull request rather than an issue.
    #[must_use]
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    /// Whether the issue was closed as not planned, which is how issues
    /// are deleted on this backend.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state.eq_ignore_ascii_case("closed")
            && self.state_reason.as_deref() == Some("not_planned")
    }
}

/// Extract `owner/repo` from `https://api.github.com/repos/{owner}/{repo}`.
#[must_use]
pub fn parse_repository_url(url: &str) -> Option<RepoConfig> {
    let (_, tail) = url.split_once("/repos/")?;
    let mut parts = tail.trim_end_matches('/').split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    if parts.next().is_some() {
        return None;
    }
    Some(RepoConfig::new(owner, repo))
}

/// The GitHub REST calls this crate consumes.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// `GET /repos/{o}/{r}/issues/{n}`
    async fn get_issue(&self, repo: &RepoConfig, number: u64) -> ApiResult<GitHubIssue>;

    /// `GET /repos/{o}/{r}/issues?state=all` (one page, 1-based).
    ///
    /// May include pull requests; see [`list_all_issues`].
    async fn list_issues(
        &self,
        repo: &RepoConfig,
        page: u32,
        per_page: u8,
    ) -> ApiResult<Vec<GitHubIssue>>;

    /// `POST /repos/{o}/{r}/issues`
    async fn create_issue(
        &self,
        repo: &RepoConfig,
        title: &str,
        body: Option<&str>,
    ) -> ApiResult<GitHubIssue>;

    /// `PATCH /repos/{o}/{r}/issues/{n}` with a new body.
    async fn update_issue_body(
        &self,
        repo: &RepoConfig,
        number: u64,
        body: &str,
    ) -> ApiResult<GitHubIssue>;

    /// `PATCH /repos/{o}/{r}/issues/{n}` closing the issue as not planned.
    async fn close_issue(&self, repo: &RepoConfig, number: u64) -> ApiResult<GitHubIssue>;

    /// Issues that block issue `number`.
    async fn list_blocked_by(&self, repo: &RepoConfig, number: u64)
    -> ApiResult<Vec<GitHubIssue>>;

    /// Issues that issue `number` blocks.
    async fn list_blocking(&self, repo: &RepoConfig, number: u64) -> ApiResult<Vec<GitHubIssue>>;

    /// Mark issue `number` as blocked by the issue with database id `blocker_id`.
    async fn add_blocked_by(&self, repo: &RepoConfig, number: u64, blocker_id: u64)
    -> ApiResult<()>;

    /// Remove the "blocked by `blocker_id`" mark from issue `number`.
    async fn remove_blocked_by(
        &self,
        repo: &RepoConfig,
        number: u64,
        blocker_id: u64,
    ) -> ApiResult<()>;

    /// Children of issue `number`.
    async fn list_sub_issues(&self, repo: &RepoConfig, number: u64)
    -> ApiResult<Vec<GitHubIssue>>;

    /// Parent of issue `number`, `None` when it has none.
    async fn get_parent(&self, repo: &RepoConfig, number: u64) -> ApiResult<Option<GitHubIssue>>;

    /// Attach the issue with database id `child_id` under issue `number`.
    ///
    /// With `replace_parent` an existing parent is swapped out instead of
    /// the call failing.
    async fn add_sub_issue(
        &self,
        repo: &RepoConfig,
        number: u64,
        child_id: u64,
        replace_parent: bool,
    ) -> ApiResult<()>;

    /// Detach the issue with database id `child_id` from issue `number`.
    async fn remove_sub_issue(&self, repo: &RepoConfig, number: u64, child_id: u64)
    -> ApiResult<()>;
}

/// Every issue of a repository, walking pages until a short page.
///
/// Pull requests are filtered out.
///
/// # Errors
///
/// Propagates the first failed page.
pub async fn list_all_issues(api: &dyn GitHubApi, repo: &RepoConfig) -> ApiResult<Vec<GitHubIssue>> {
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let batch = api.list_issues(repo, page, PAGE_SIZE).await?;
        let short = batch.len() < usize::from(PAGE_SIZE);
        all.extend(batch.into_iter().filter(|issue| !issue.is_pull_request()));
        if short {
            break;
        }
        page += 1;
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://api.github.com/repos/acme/widgets", Some(("acme", "widgets")))]
    #[case("https://ghe.example.com/api/v3/repos/acme/widgets/", Some(("acme", "widgets")))]
    #[case("https://api.github.com/repos/acme", None)]
    #[case("https://api.github.com/users/acme", None)]
    #[case("https://api.github.com/repos/acme/widgets/issues", None)]
    fn test_parse_repository_url(#[case] url: &str, #[case] expected: Option<(&str, &str)>) {
        let expected = expected.map(|(o, r)| RepoConfig::new(o, r));
        assert_eq!(parse_repository_url(url), expected);
    }

    #[rstest]
    #[case::open("open", None, false)]
    #[case::completed("closed", Some("completed"), false)]
    #[case::not_planned("closed", Some("not_planned"), true)]
    #[case::reopened("open", Some("reopened"), false)]
    fn test_is_deleted(#[case] state: &str, #[case] reason: Option<&str>, #[case] expected: bool) {
        let issue: GitHubIssue = serde_json::from_value(serde_json::json!({
            "id": 1,
            "node_id": "I_1",
            "number": 1,
            "title": "T",
            "state": state,
            "state_reason": reason,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(issue.is_deleted(), expected);
    }
}
