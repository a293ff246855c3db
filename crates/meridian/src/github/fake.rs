//! In-memory [`GitHubApi`] for tests.
//!
//! `FakeGitHub` models a single repository with issues, "blocked by"
//! dependencies and sub-issue parents. It answers the way GitHub does for the
//! cases the strategies care about:
//!
//! - unknown issue numbers and foreign repositories → 404
//! - disabled dependency / sub-issue features → 404 on those endpoints
//! - duplicate dependency → 422 "already exists"; duplicate sub-issue → 409
//! - removing a relationship that does not exist → 404
//!
//! Failures can be scripted per operation with [`FakeGitHub::fail_next`],
//! and [`FakeGitHub::serve_stale_body_once`] replays an old body on the next
//! read to reproduce lost-update interleavings deterministically.

use super::status::{ApiError, ApiResult, ApiStatus};
use super::{GitHubApi, GitHubIssue};
use crate::domain::RepoConfig;
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tokio::sync::Mutex;

/// Operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    /// `get_issue`
    GetIssue,
    /// `list_issues`
    ListIssues,
    /// `update_issue_body`
    UpdateBody,
    /// `list_blocked_by`
    ListBlockedBy,
    /// `list_blocking`
    ListBlocking,
    /// `add_blocked_by`
    AddBlockedBy,
    /// `remove_blocked_by`
    RemoveBlockedBy,
    /// `list_sub_issues`
    ListSubIssues,
    /// `get_parent`
    GetParent,
    /// `add_sub_issue`
    AddSubIssue,
    /// `remove_sub_issue`
    RemoveSubIssue,
}

#[derive(Debug, Default)]
struct FakeState {
    issues: BTreeMap<u64, GitHubIssue>,
    /// (blocked, blocker) by issue number
    blocked_by: BTreeSet<(u64, u64)>,
    /// child -> parent by issue number
    parents: BTreeMap<u64, u64>,
    dependencies_disabled: bool,
    sub_issues_disabled: bool,
    failures: HashMap<FakeOp, VecDeque<ApiError>>,
    stale_bodies: HashMap<u64, Option<String>>,
    body_writes: usize,
}

/// In-memory GitHub repository.
#[derive(Debug)]
pub struct FakeGitHub {
    repo: RepoConfig,
    state: Mutex<FakeState>,
}

fn not_found() -> ApiError {
    ApiError::status(ApiStatus::NotFound, "Not Found")
}

impl FakeGitHub {
    /// An empty fake for `repo`.
    #[must_use]
    pub fn new(repo: RepoConfig) -> Self {
        Self {
            repo,
            state: Mutex::new(FakeState::default()),
        }
    }

    /// The repository this fake serves.
    #[must_use]
    pub fn repo(&self) -> &RepoConfig {
        &self.repo
    }

    /// Add an issue directly and return it.
    pub async fn seed_issue(&self, title: &str, body: Option<&str>) -> GitHubIssue {
        let mut state = self.state.lock().await;
        insert_issue(&mut state, &self.repo, title, body)
    }

    /// Issue `number` as currently stored, closed or not.
    pub async fn issue(&self, number: u64) -> Option<GitHubIssue> {
        self.state.lock().await.issues.get(&number).cloned()
    }

    /// Current body of issue `number`.
    pub async fn body_of(&self, number: u64) -> Option<String> {
        let state = self.state.lock().await;
        state.issues.get(&number).and_then(|i| i.body.clone())
    }

    /// Overwrite the body of issue `number` without counting a write.
    pub async fn set_body(&self, number: u64, body: Option<&str>) {
        let mut state = self.state.lock().await;
        if let Some(issue) = state.issues.get_mut(&number) {
            issue.body = body.map(String::from);
        }
    }

    /// Number of successful `update_issue_body` calls so far.
    pub async fn body_writes(&self) -> usize {
        self.state.lock().await.body_writes
    }

    /// Whether `blocked` is currently marked as blocked by `blocker`.
    pub async fn is_blocked_by(&self, blocked: u64, blocker: u64) -> bool {
        self.state
            .lock()
            .await
            .blocked_by
            .contains(&(blocked, blocker))
    }

    /// Current parent of `child`, by number.
    pub async fn parent_of(&self, child: u64) -> Option<u64> {
        self.state.lock().await.parents.get(&child).copied()
    }

    /// Turn the dependency endpoints off (404) or back on.
    pub async fn set_dependencies_enabled(&self, enabled: bool) {
        self.state.lock().await.dependencies_disabled = !enabled;
    }

    /// Turn the sub-issue endpoints off (404) or back on.
    pub async fn set_sub_issues_enabled(&self, enabled: bool) {
        self.state.lock().await.sub_issues_disabled = !enabled;
    }

    /// Make the next call of `op` fail with `error`.
    pub async fn fail_next(&self, op: FakeOp, error: ApiError) {
        self.state
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Make the next `get_issue(number)` return `body` instead of the
    /// current one.
    pub async fn serve_stale_body_once(&self, number: u64, body: Option<&str>) {
        self.state
            .lock()
            .await
            .stale_bodies
            .insert(number, body.map(String::from));
    }

    async fn enter(&self, op: FakeOp, repo: &RepoConfig) -> ApiResult<tokio::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().await;
        if let Some(error) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        if repo != &self.repo {
            return Err(not_found());
        }
        let gated = match op {
            FakeOp::ListBlockedBy
            | FakeOp::ListBlocking
            | FakeOp::AddBlockedBy
            | FakeOp::RemoveBlockedBy => state.dependencies_disabled,
            FakeOp::ListSubIssues
            | FakeOp::GetParent
            | FakeOp::AddSubIssue
            | FakeOp::RemoveSubIssue => state.sub_issues_disabled,
            _ => false,
        };
        if gated {
            return Err(not_found());
        }
        Ok(state)
    }
}

fn insert_issue(
    state: &mut FakeState,
    repo: &RepoConfig,
    title: &str,
    body: Option<&str>,
) -> GitHubIssue {
    let number = state.issues.keys().next_back().map_or(1, |n| n + 1);
    let base = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let created_at = base + Duration::minutes(i64::try_from(number).unwrap_or_default());
    let issue = GitHubIssue {
        id: 1_000 + number,
        node_id: format!("I_node{number}"),
        number,
        title: title.to_string(),
        body: body.map(String::from),
        state: "open".to_string(),
        state_reason: None,
        repository_url: Some(format!(
            "https://api.github.com/repos/{}/{}",
            repo.owner, repo.repo
        )),
        created_at,
        updated_at: created_at,
        pull_request: None,
    };
    state.issues.insert(number, issue.clone());
    issue
}

fn number_for_id(state: &FakeState, id: u64) -> Option<u64> {
    state.issues.values().find(|i| i.id == id).map(|i| i.number)
}

fn issues_by_number(state: &FakeState, numbers: impl Iterator<Item = u64>) -> Vec<GitHubIssue> {
    numbers
        .filter_map(|n| state.issues.get(&n).cloned())
        .collect()
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn get_issue(&self, repo: &RepoConfig, number: u64) -> ApiResult<GitHubIssue> {
        let mut state = self.enter(FakeOp::GetIssue, repo).await?;
        let stale = state.stale_bodies.remove(&number);
        let mut issue = state.issues.get(&number).cloned().ok_or_else(not_found)?;
        if let Some(body) = stale {
            issue.body = body;
        }
        Ok(issue)
    }

    async fn list_issues(
        &self,
        repo: &RepoConfig,
        page: u32,
        per_page: u8,
    ) -> ApiResult<Vec<GitHubIssue>> {
        let state = self.enter(FakeOp::ListIssues, repo).await?;
        let per_page = usize::from(per_page.max(1));
        let skip = usize::try_from(page.saturating_sub(1)).unwrap_or_default() * per_page;
        Ok(state
            .issues
            .values()
            .skip(skip)
            .take(per_page)
            .cloned()
            .collect())
    }

    async fn create_issue(
        &self,
        repo: &RepoConfig,
        title: &str,
        body: Option<&str>,
    ) -> ApiResult<GitHubIssue> {
        if repo != &self.repo {
            return Err(not_found());
        }
        let mut state = self.state.lock().await;
        Ok(insert_issue(&mut state, &self.repo, title, body))
    }

    async fn update_issue_body(
        &self,
        repo: &RepoConfig,
        number: u64,
        body: &str,
    ) -> ApiResult<GitHubIssue> {
        let mut state = self.enter(FakeOp::UpdateBody, repo).await?;
        let issue = state.issues.get_mut(&number).ok_or_else(not_found)?;
        issue.body = Some(body.to_string());
        issue.updated_at = issue.updated_at + Duration::seconds(1);
        let updated = issue.clone();
        state.body_writes += 1;
        Ok(updated)
    }

    async fn close_issue(&self, repo: &RepoConfig, number: u64) -> ApiResult<GitHubIssue> {
        if repo != &self.repo {
            return Err(not_found());
        }
        let mut state = self.state.lock().await;
        let issue = state.issues.get_mut(&number).ok_or_else(not_found)?;
        issue.state = "closed".to_string();
        issue.state_reason = Some("not_planned".to_string());
        Ok(issue.clone())
    }

    async fn list_blocked_by(
        &self,
        repo: &RepoConfig,
        number: u64,
    ) -> ApiResult<Vec<GitHubIssue>> {
        let state = self.enter(FakeOp::ListBlockedBy, repo).await?;
        if !state.issues.contains_key(&number) {
            return Err(not_found());
        }
        let blockers = state
            .blocked_by
            .iter()
            .filter(|(blocked, _)| *blocked == number)
            .map(|(_, blocker)| *blocker);
        Ok(issues_by_number(&state, blockers))
    }

    async fn list_blocking(&self, repo: &RepoConfig, number: u64) -> ApiResult<Vec<GitHubIssue>> {
        let state = self.enter(FakeOp::ListBlocking, repo).await?;
        if !state.issues.contains_key(&number) {
            return Err(not_found());
        }
        let blocked = state
            .blocked_by
            .iter()
            .filter(|(_, blocker)| *blocker == number)
            .map(|(blocked, _)| *blocked);
        Ok(issues_by_number(&state, blocked))
    }

    async fn add_blocked_by(
        &self,
        repo: &RepoConfig,
        number: u64,
        blocker_id: u64,
    ) -> ApiResult<()> {
        let mut state = self.enter(FakeOp::AddBlockedBy, repo).await?;
        let blocker = number_for_id(&state, blocker_id).ok_or_else(not_found)?;
        if !state.issues.contains_key(&number) {
            return Err(not_found());
        }
        if !state.blocked_by.insert((number, blocker)) {
            return Err(ApiError::status(
                ApiStatus::Unprocessable,
                "Validation Failed: dependency already exists",
            ));
        }
        Ok(())
    }

    async fn remove_blocked_by(
        &self,
        repo: &RepoConfig,
        number: u64,
        blocker_id: u64,
    ) -> ApiResult<()> {
        let mut state = self.enter(FakeOp::RemoveBlockedBy, repo).await?;
        let blocker = number_for_id(&state, blocker_id).ok_or_else(not_found)?;
        if state.blocked_by.remove(&(number, blocker)) {
            Ok(())
        } else {
            Err(not_found())
        }
    }

    async fn list_sub_issues(
        &self,
        repo: &RepoConfig,
        number: u64,
    ) -> ApiResult<Vec<GitHubIssue>> {
        let state = self.enter(FakeOp::ListSubIssues, repo).await?;
        if !state.issues.contains_key(&number) {
            return Err(not_found());
        }
        let children = state
            .parents
            .iter()
            .filter(|(_, parent)| **parent == number)
            .map(|(child, _)| *child);
        Ok(issues_by_number(&state, children))
    }

    async fn get_parent(&self, repo: &RepoConfig, number: u64) -> ApiResult<Option<GitHubIssue>> {
        let state = self.enter(FakeOp::GetParent, repo).await?;
        if !state.issues.contains_key(&number) {
            return Err(not_found());
        }
        Ok(state
            .parents
            .get(&number)
            .and_then(|parent| state.issues.get(parent).cloned()))
    }

    async fn add_sub_issue(
        &self,
        repo: &RepoConfig,
        number: u64,
        child_id: u64,
        replace_parent: bool,
    ) -> ApiResult<()> {
        let mut state = self.enter(FakeOp::AddSubIssue, repo).await?;
        let child = number_for_id(&state, child_id).ok_or_else(not_found)?;
        if !state.issues.contains_key(&number) {
            return Err(not_found());
        }
        match state.parents.get(&child).copied() {
            Some(existing) if existing == number => Err(ApiError::status(
                ApiStatus::Conflict,
                "Issue is already a sub-issue of this parent",
            )),
            Some(_) if !replace_parent => Err(ApiError::status(
                ApiStatus::Unprocessable,
                "Issue may only have one parent",
            )),
            _ => {
                state.parents.insert(child, number);
                Ok(())
            }
        }
    }

    async fn remove_sub_issue(
        &self,
        repo: &RepoConfig,
        number: u64,
        child_id: u64,
    ) -> ApiResult<()> {
        let mut state = self.enter(FakeOp::RemoveSubIssue, repo).await?;
        let child = number_for_id(&state, child_id).ok_or_else(not_found)?;
        if state.parents.get(&child) == Some(&number) {
            state.parents.remove(&child);
            Ok(())
        } else {
            Err(not_found())
        }
    }
}
