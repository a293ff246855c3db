//! [`GitHubApi`] over the GitHub REST API.

use super::status::{ApiError, ApiResult, ApiStatus};
use super::{GitHubApi, GitHubIssue};
use crate::domain::RepoConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

/// Default public API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const RELATION_PAGE_SIZE: u8 = 100;

/// REST client for one GitHub host.
#[derive(Debug, Clone)]
pub struct RestGitHubClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl RestGitHubClient {
    /// Create a client for `base_url` (e.g. [`DEFAULT_API_URL`]).
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("meridian/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn issue_url(&self, repo: &RepoConfig, number: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/{number}",
            self.base_url, repo.owner, repo.repo
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_raw(&self, builder: RequestBuilder) -> ApiResult<String> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        let message = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or(text);
        debug!(status = status.as_u16(), %message, "GitHub request failed");
        Err(ApiError::status(ApiStatus::from_code(status.as_u16()), message))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let text = self.send_raw(builder).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> ApiResult<()> {
        self.send_raw(builder).await.map(|_| ())
    }

    async fn list_relation(&self, url: &str) -> ApiResult<Vec<GitHubIssue>> {
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let batch: Vec<GitHubIssue> = self
                .send(
                    self.request(Method::GET, url)
                        .query(&[("per_page", u32::from(RELATION_PAGE_SIZE)), ("page", page)]),
                )
                .await?;
            let short = batch.len() < usize::from(RELATION_PAGE_SIZE);
            all.extend(batch);
            if short {
                return Ok(all);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl GitHubApi for RestGitHubClient {
    async fn get_issue(&self, repo: &RepoConfig, number: u64) -> ApiResult<GitHubIssue> {
        self.send(self.request(Method::GET, &self.issue_url(repo, number)))
            .await
    }

    async fn list_issues(
        &self,
        repo: &RepoConfig,
        page: u32,
        per_page: u8,
    ) -> ApiResult<Vec<GitHubIssue>> {
        let url = format!("{}/repos/{}/{}/issues", self.base_url, repo.owner, repo.repo);
        let page = page.to_string();
        let per_page = per_page.to_string();
        self.send(self.request(Method::GET, &url).query(&[
            ("state", "all"),
            ("direction", "asc"),
            ("page", page.as_str()),
            ("per_page", per_page.as_str()),
        ]))
        .await
    }

    async fn create_issue(
        &self,
        repo: &RepoConfig,
        title: &str,
        body: Option<&str>,
    ) -> ApiResult<GitHubIssue> {
        let url = format!("{}/repos/{}/{}/issues", self.base_url, repo.owner, repo.repo);
        self.send(
            self.request(Method::POST, &url)
                .json(&json!({ "title": title, "body": body })),
        )
        .await
    }

    async fn update_issue_body(
        &self,
        repo: &RepoConfig,
        number: u64,
        body: &str,
    ) -> ApiResult<GitHubIssue> {
        self.send(
            self.request(Method::PATCH, &self.issue_url(repo, number))
                .json(&json!({ "body": body })),
        )
        .await
    }

    async fn close_issue(&self, repo: &RepoConfig, number: u64) -> ApiResult<GitHubIssue> {
        self.send(
            self.request(Method::PATCH, &self.issue_url(repo, number))
                .json(&json!({ "state": "closed", "state_reason": "not_planned" })),
        )
        .await
    }

    async fn list_blocked_by(
        &self,
        repo: &RepoConfig,
        number: u64,
    ) -> ApiResult<Vec<GitHubIssue>> {
        let url = format!("{}/dependencies/blocked_by", self.issue_url(repo, number));
        self.list_relation(&url).await
    }

    async fn list_blocking(&self, repo: &RepoConfig, number: u64) -> ApiResult<Vec<GitHubIssue>> {
        let url = format!("{}/dependencies/blocking", self.issue_url(repo, number));
        self.list_relation(&url).await
    }

    async fn add_blocked_by(
        &self,
        repo: &RepoConfig,
        number: u64,
        blocker_id: u64,
    ) -> ApiResult<()> {
        let url = format!("{}/dependencies/blocked_by", self.issue_url(repo, number));
        self.send_empty(
            self.request(Method::POST, &url)
                .json(&json!({ "issue_id": blocker_id })),
        )
        .await
    }

    async fn remove_blocked_by(
        &self,
        repo: &RepoConfig,
        number: u64,
        blocker_id: u64,
    ) -> ApiResult<()> {
        let url = format!(
            "{}/dependencies/blocked_by/{blocker_id}",
            self.issue_url(repo, number)
        );
        self.send_empty(self.request(Method::DELETE, &url)).await
    }

    async fn list_sub_issues(
        &self,
        repo: &RepoConfig,
        number: u64,
    ) -> ApiResult<Vec<GitHubIssue>> {
        let url = format!("{}/sub_issues", self.issue_url(repo, number));
        self.list_relation(&url).await
    }

    async fn get_parent(&self, repo: &RepoConfig, number: u64) -> ApiResult<Option<GitHubIssue>> {
        let url = format!("{}/parent", self.issue_url(repo, number));
        let text = self.send_raw(self.request(Method::GET, &url)).await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn add_sub_issue(
        &self,
        repo: &RepoConfig,
        number: u64,
        child_id: u64,
        replace_parent: bool,
    ) -> ApiResult<()> {
        let url = format!("{}/sub_issues", self.issue_url(repo, number));
        self.send_empty(self.request(Method::POST, &url).json(&json!({
            "sub_issue_id": child_id,
            "replace_parent": replace_parent,
        })))
        .await
    }

    async fn remove_sub_issue(
        &self,
        repo: &RepoConfig,
        number: u64,
        child_id: u64,
    ) -> ApiResult<()> {
        let url = format!("{}/sub_issue", self.issue_url(repo, number));
        self.send_empty(
            self.request(Method::DELETE, &url)
                .json(&json!({ "sub_issue_id": child_id })),
        )
        .await
    }
}
