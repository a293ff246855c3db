//! [`IssueRepository`] over GitHub issues.

use super::{IssueIndex, to_domain};
use crate::domain::{Issue, IssueFilter, IssueId, NewIssue};
use crate::error::{Error, Result};
use crate::github::{GitHubApi, GitHubIssue, NotFoundMeans};
use crate::storage::IssueRepository;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

const FEATURE: &str = "sub-issues";

/// GitHub-backed issues. The parent pointer is the native sub-issue parent.
pub struct GitHubIssueRepository {
    client: Arc<dyn GitHubApi>,
    index: Arc<IssueIndex>,
}

impl std::fmt::Debug for GitHubIssueRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubIssueRepository")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl GitHubIssueRepository {
    /// Create a repository sharing `index` with its link repository.
    pub fn new(client: Arc<dyn GitHubApi>, index: Arc<IssueIndex>) -> Self {
        Self { client, index }
    }

    /// Parent of issue `number`, or `None` when sub-issues are unavailable.
    async fn parent_of(&self, number: u64) -> Result<Option<GitHubIssue>> {
        match self.client.get_parent(self.index.repo(), number).await {
            Ok(parent) => Ok(parent),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into_domain(NotFoundMeans::FeatureDisabled(FEATURE))),
        }
    }

    /// Remove sub-issue `child_id` from issue `parent`; already gone is fine.
    async fn detach(&self, parent: u64, child_id: u64) -> Result<()> {
        match self
            .client
            .remove_sub_issue(self.index.repo(), parent, child_id)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into_domain(NotFoundMeans::FeatureDisabled(FEATURE))),
        }
    }

    async fn with_parent(&self, issue: GitHubIssue) -> Result<Issue> {
        let parent = self.parent_of(issue.number).await?;
        let parent_id = match parent {
            Some(parent) => Some(self.index.remember(&parent).await.id),
            None => None,
        };
        Ok(to_domain(issue, parent_id))
    }
}

#[async_trait]
impl IssueRepository for GitHubIssueRepository {
    async fn create(&self, new_issue: NewIssue) -> Result<Issue> {
        new_issue.validate()?;

        let repo = self.index.repo();
        let created = self
            .client
            .create_issue(repo, new_issue.title.trim(), new_issue.body.as_deref())
            .await
            .map_err(|e| e.into_domain(NotFoundMeans::FeatureDisabled("repository issues")))?;
        self.index.remember(&created).await;
        info!(number = created.number, node_id = %created.node_id, "Created GitHub issue");

        Ok(to_domain(created, None))
    }

    async fn get(&self, id: &IssueId) -> Result<Option<Issue>> {
        let Some(entry) = self.index.lookup(id).await? else {
            return Ok(None);
        };
        let issue = match self.client.get_issue(self.index.repo(), entry.number).await {
            Ok(issue) if issue.is_deleted() => {
                self.index.forget(id).await;
                return Ok(None);
            }
            Ok(issue) => issue,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into_domain(NotFoundMeans::issue(entry.number))),
        };
        self.with_parent(issue).await.map(Some)
    }

    async fn list(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let listed = match &filter.parent_id {
            Some(parent) => {
                let Some(entry) = self.index.lookup(parent).await? else {
                    return Ok(Vec::new());
                };
                self.client
                    .list_sub_issues(self.index.repo(), entry.number)
                    .await
                    .map_err(|e| e.into_domain(NotFoundMeans::FeatureDisabled(FEATURE)))?
            }
            None => self.index.refresh().await?,
        };

        let live = listed.into_iter().filter(|issue| !issue.is_deleted());
        let mut issues = try_join_all(live.map(|issue| self.with_parent(issue))).await?;
        issues.retain(|issue| filter.matches(issue));
        issues.sort_by_key(|issue| issue.number);
        if let Some(limit) = filter.limit {
            issues.truncate(limit);
        }
        Ok(issues)
    }

    async fn children(&self, id: &IssueId) -> Result<Vec<Issue>> {
        let entry = self.index.require(id).await?;
        let children = match self
            .client
            .list_sub_issues(self.index.repo(), entry.number)
            .await
        {
            Ok(children) => children,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into_domain(NotFoundMeans::FeatureDisabled(FEATURE))),
        };

        let mut issues = Vec::with_capacity(children.len());
        for child in children.into_iter().filter(|child| !child.is_deleted()) {
            self.index.remember(&child).await;
            issues.push(to_domain(child, Some(id.clone())));
        }
        issues.sort_by_key(|issue| issue.number);
        Ok(issues)
    }

    async fn set_parent(&self, id: &IssueId, parent: Option<&IssueId>) -> Result<Issue> {
        let child = self.index.require(id).await?;
        let repo = self.index.repo();

        match parent {
            Some(parent) => {
                let parent = self.index.require(parent).await?;
                debug!(child = child.number, parent = parent.number, "Setting sub-issue parent");
                match self
                    .client
                    .add_sub_issue(repo, parent.number, child.database_id, true)
                    .await
                {
                    Ok(()) => {}
                    Err(e) if e.is_duplicate_relationship() => {}
                    Err(e) => return Err(e.into_domain(NotFoundMeans::FeatureDisabled(FEATURE))),
                }
            }
            None => {
                if let Some(current) = self.parent_of(child.number).await? {
                    debug!(child = child.number, parent = current.number, "Clearing sub-issue parent");
                    self.detach(current.number, child.database_id).await?;
                }
            }
        }

        self.get(id)
            .await?
            .ok_or_else(|| Error::issue_not_found(id.as_str()))
    }

    async fn delete(&self, id: &IssueId) -> Result<()> {
        let entry = self.index.require(id).await?;

        // GitHub keeps sub-issue edges on closed issues.
        for child in self.children(id).await? {
            let child = self.index.require(&child.id).await?;
            debug!(parent = entry.number, child = child.number, "Detaching child of deleted issue");
            self.detach(entry.number, child.database_id).await?;
        }
        if let Some(parent) = self.parent_of(entry.number).await? {
            self.detach(parent.number, entry.database_id).await?;
        }

        self.client
            .close_issue(self.index.repo(), entry.number)
            .await
            .map_err(|e| e.into_domain(NotFoundMeans::issue(entry.number)))?;
        self.index.forget(id).await;
        info!(number = entry.number, "Closed GitHub issue as not planned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RepoConfig;
    use crate::error::ErrorKind;
    use crate::github::FakeGitHub;

    async fn setup() -> (Arc<FakeGitHub>, GitHubIssueRepository) {
        let repo = RepoConfig::new("acme", "widgets");
        let fake = Arc::new(FakeGitHub::new(repo.clone()));
        let index = Arc::new(IssueIndex::new(fake.clone(), repo));
        let issues = GitHubIssueRepository::new(fake.clone(), index);
        (fake, issues)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_fake, issues) = setup().await;

        let created = issues
            .create(NewIssue {
                title: "  Crash on start ".to_string(),
                body: Some("Trace attached".to_string()),
            })
            .await
            .unwrap();

        let fetched = issues.get(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Crash on start");
        assert_eq!(fetched.body.as_deref(), Some("Trace attached"));
        assert_eq!(fetched.parent_id, None);
    }

    #[tokio::test]
    async fn test_get_unknown_is_none() {
        let (_fake, issues) = setup().await;
        assert!(issues.get(&IssueId::new("I_nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_and_clear_parent() {
        let (fake, issues) = setup().await;
        let epic = issues.create(NewIssue::titled("Epic")).await.unwrap();
        let story = issues.create(NewIssue::titled("Story")).await.unwrap();
        let other = issues.create(NewIssue::titled("Other epic")).await.unwrap();

        let updated = issues.set_parent(&story.id, Some(&epic.id)).await.unwrap();
        assert_eq!(updated.parent_id, Some(epic.id.clone()));

        // Replacing an existing parent is allowed here.
        issues.set_parent(&story.id, Some(&other.id)).await.unwrap();
        assert_eq!(fake.parent_of(story.number).await, Some(other.number));

        let cleared = issues.set_parent(&story.id, None).await.unwrap();
        assert_eq!(cleared.parent_id, None);
        assert!(issues.children(&other.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_parent() {
        let (_fake, issues) = setup().await;
        let epic = issues.create(NewIssue::titled("Epic")).await.unwrap();
        let story = issues.create(NewIssue::titled("Story")).await.unwrap();
        issues.create(NewIssue::titled("Unrelated")).await.unwrap();
        issues.set_parent(&story.id, Some(&epic.id)).await.unwrap();

        let filter = IssueFilter {
            parent_id: Some(epic.id.clone()),
            ..IssueFilter::default()
        };
        let listed = issues.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, story.id);

        assert_eq!(issues.list(&IssueFilter::default()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_closes_and_hides_issue() {
        let (fake, issues) = setup().await;
        let kept = issues.create(NewIssue::titled("Kept")).await.unwrap();
        let issue = issues.create(NewIssue::titled("Obsolete")).await.unwrap();

        issues.delete(&issue.id).await.unwrap();

        let closed = fake.issue(issue.number).await.unwrap();
        assert_eq!(closed.state, "closed");
        assert_eq!(closed.state_reason.as_deref(), Some("not_planned"));

        assert!(issues.get(&issue.id).await.unwrap().is_none());
        let listed = issues.list(&IssueFilter::default()).await.unwrap();
        assert_eq!(listed.iter().map(|i| &i.id).collect::<Vec<_>>(), [&kept.id]);

        let err = issues.delete(&issue.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_detaches_hierarchy() {
        let (fake, issues) = setup().await;
        let epic = issues.create(NewIssue::titled("Epic")).await.unwrap();
        let story = issues.create(NewIssue::titled("Story")).await.unwrap();
        let task = issues.create(NewIssue::titled("Task")).await.unwrap();
        issues.set_parent(&story.id, Some(&epic.id)).await.unwrap();
        issues.set_parent(&task.id, Some(&story.id)).await.unwrap();

        issues.delete(&story.id).await.unwrap();

        assert_eq!(fake.parent_of(task.number).await, None);
        assert_eq!(fake.parent_of(story.number).await, None);
        assert!(issues.children(&epic.id).await.unwrap().is_empty());
        assert_eq!(issues.get(&task.id).await.unwrap().unwrap().parent_id, None);
    }

    #[tokio::test]
    async fn test_externally_closed_as_not_planned_is_gone() {
        let (fake, issues) = setup().await;
        let issue = issues.create(NewIssue::titled("Dropped")).await.unwrap();

        fake.close_issue(fake.repo(), issue.number).await.unwrap();

        assert!(issues.get(&issue.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_children_without_sub_issue_feature_is_empty() {
        let (fake, issues) = setup().await;
        let epic = issues.create(NewIssue::titled("Epic")).await.unwrap();
        fake.set_sub_issues_enabled(false).await;

        assert!(issues.children(&epic.id).await.unwrap().is_empty());
        assert_eq!(issues.get(&epic.id).await.unwrap().unwrap().parent_id, None);
    }
}
