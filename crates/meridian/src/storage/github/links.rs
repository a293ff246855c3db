//! [`LinkRepository`] over the strategy layer.
//!
//! Native edges are visible from both ends. Comment markers are only stored
//! on the source issue, so incoming comment links are found by scanning
//! every issue body in the repository.
//!
//! Sub-issue edges are the hierarchy, not links: they are never reported
//! here and `parent` is rejected on write. Only
//! [`GitHubIssueRepository`](super::GitHubIssueRepository) changes them.

use super::{IndexedIssue, IssueIndex};
use crate::codec;
use crate::domain::{IssueId, IssueLink, LinkId, ParsedNativeLink};
use crate::error::{Error, ErrorKind, Result};
use crate::github::{GitHubApi, GitHubIssue};
use crate::registry::BLOCKS;
use crate::strategy::{BLOCKED_BY, LinkStrategy, PARENT, StrategyRouter};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// GitHub-backed links.
pub struct GitHubLinkRepository {
    client: Arc<dyn GitHubApi>,
    index: Arc<IssueIndex>,
    router: StrategyRouter,
}

impl std::fmt::Debug for GitHubLinkRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubLinkRepository")
            .field("index", &self.index)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

fn hierarchy_edge(link_type: &str) -> Error {
    Error::validation(
        "link_type",
        format!("'{link_type}' is the issue hierarchy; use reparent to change it"),
    )
}

/// `blocked_by` is stored as `blocks` with the ends swapped.
fn native_orientation<'a>(
    link_type: &'a str,
    source: &'a IssueId,
    target: &'a IssueId,
) -> (&'a str, &'a IssueId, &'a IssueId) {
    if link_type == BLOCKED_BY {
        (BLOCKS, target, source)
    } else {
        (link_type, source, target)
    }
}

/// A link read back from GitHub carries the later of its endpoints'
/// creation times.
fn link_between(source: &IndexedIssue, target: &IndexedIssue, link_type: &str) -> IssueLink {
    IssueLink::new(
        source.id.clone(),
        target.id.clone(),
        link_type,
        source.created_at.max(target.created_at),
    )
}

impl GitHubLinkRepository {
    /// Create a repository sharing `index` with its issue repository.
    pub fn new(client: Arc<dyn GitHubApi>, index: Arc<IssueIndex>, router: StrategyRouter) -> Self {
        Self {
            client,
            index,
            router,
        }
    }

    /// The GitHub client this repository writes through.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn GitHubApi> {
        &self.client
    }

    /// Turn a strategy result seen from `me` into a domain link.
    ///
    /// Edges into other repositories and edges to issues that no longer
    /// exist are skipped.
    async fn resolve(&self, me: &IndexedIssue, parsed: &ParsedNativeLink) -> Result<Option<IssueLink>> {
        if !parsed.is_in(self.index.repo()) {
            debug!(
                owner = %parsed.owner,
                repo = %parsed.repo,
                number = parsed.issue_number,
                "Skipping link into another repository"
            );
            return Ok(None);
        }
        let other = match self.index.by_number(parsed.issue_number).await {
            Ok(other) => other,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(number = parsed.issue_number, "Link points at a missing issue");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let link = if parsed.reversed {
            link_between(&other, me, &parsed.link_type)
        } else {
            link_between(me, &other, &parsed.link_type)
        };
        Ok(Some(link))
    }

    /// Link strategies for `link_type`, or all of them. The sub-issue
    /// strategy is never included.
    fn strategies_for(&self, link_type: Option<&str>) -> Vec<Arc<LinkStrategy>> {
        let strategies = match link_type {
            None => self.router.all_strategies(),
            Some(name) => self.router.resolve_strategy(name).into_iter().collect(),
        };
        strategies
            .into_iter()
            .filter(|strategy| !matches!(strategy.as_ref(), LinkStrategy::SubIssue(_)))
            .collect()
    }

    /// Links the strategies report for `me`, from either end.
    async fn strategy_links(&self, me: &IndexedIssue, link_type: Option<&str>) -> Result<Vec<IssueLink>> {
        let repo = self.index.repo();
        let strategies = self.strategies_for(link_type);
        let found = try_join_all(
            strategies
                .iter()
                .map(|strategy| strategy.find_links_by_issue(me.number, repo)),
        )
        .await?;

        let mut links = Vec::new();
        for parsed in found.iter().flatten() {
            if link_type.is_some_and(|t| parsed.link_type != t) {
                continue;
            }
            if let Some(link) = self.resolve(me, parsed).await? {
                links.push(link);
            }
        }
        Ok(links)
    }

    /// Comment links stored in other issues' bodies that point at `me`.
    async fn incoming_markers(&self, me: &IndexedIssue, link_type: Option<&str>) -> Result<Vec<IssueLink>> {
        let comment_types: HashSet<&str> = self.router.comment_types().collect();
        if link_type.is_some_and(|t| !comment_types.contains(t)) {
            return Ok(Vec::new());
        }

        let repo = self.index.repo();
        let issues = self.index.refresh().await?;
        let mut links = Vec::new();
        for issue in issues.iter().filter(|issue| issue.number != me.number) {
            for parsed in codec::parse(issue.body.as_deref(), repo) {
                let wanted = parsed.issue_number == me.number
                    && parsed.is_in(repo)
                    && comment_types.contains(parsed.link_type.as_str())
                    && link_type.is_none_or(|t| parsed.link_type == t);
                if wanted {
                    links.push(link_between(&IndexedIssue::from(issue), me, &parsed.link_type));
                }
            }
        }
        Ok(links)
    }

    /// Every link whose source is `issue`, using the listed body for markers.
    async fn outgoing_links(&self, issue: &GitHubIssue) -> Result<Vec<IssueLink>> {
        let repo = self.index.repo();
        let me = IndexedIssue::from(issue);
        let comment_types: HashSet<&str> = self.router.comment_types().collect();

        let mut parsed: Vec<ParsedNativeLink> = codec::parse(issue.body.as_deref(), repo)
            .into_iter()
            .filter(|link| comment_types.contains(link.link_type.as_str()))
            .collect();
        let dependencies = self.router.resolve_strategy(BLOCKS)?;
        parsed.extend(
            dependencies
                .find_links_by_issue(me.number, repo)
                .await?
                .into_iter()
                .filter(|link| !link.reversed),
        );

        let mut links = Vec::with_capacity(parsed.len());
        for link in &parsed {
            if let Some(link) = self.resolve(&me, link).await? {
                links.push(link);
            }
        }
        Ok(links)
    }

    async fn remove(&self, link: &IssueLink) -> Result<()> {
        if link.link_type == PARENT {
            return Err(hierarchy_edge(&link.link_type));
        }
        let source = self.index.require(&link.source_issue_id).await?;
        let target = self.index.require(&link.target_issue_id).await?;
        let strategy = self.router.resolve_strategy(&link.link_type)?;
        strategy
            .delete_link(source.number, target.number, self.index.repo())
            .await
    }
}

#[async_trait]
impl crate::storage::LinkRepository for GitHubLinkRepository {
    async fn create(&self, link: IssueLink) -> Result<IssueLink> {
        let (link_type, source, target) =
            native_orientation(&link.link_type, &link.source_issue_id, &link.target_issue_id);
        if link_type == PARENT {
            return Err(hierarchy_edge(link_type));
        }
        let strategy = self.router.resolve_strategy(link_type)?;
        let source = self.index.require(source).await?;
        let target = self.index.require(target).await?;

        strategy
            .create_link(source.number, target.number, self.index.repo())
            .await?;
        debug!(
            link_type,
            source = source.number,
            target = target.number,
            strategy = strategy.name(),
            "Persisted link"
        );
        Ok(link_between(&source, &target, link_type))
    }

    async fn find_by_id(&self, id: &LinkId) -> Result<Option<IssueLink>> {
        let issues = self.index.refresh().await?;
        for issue in &issues {
            if let Some(link) = self
                .outgoing_links(issue)
                .await?
                .into_iter()
                .find(|link| &link.id == id)
            {
                return Ok(Some(link));
            }
        }
        Ok(None)
    }

    async fn find(
        &self,
        source: &IssueId,
        target: &IssueId,
        link_type: &str,
    ) -> Result<Option<IssueLink>> {
        let (link_type, source, target) = native_orientation(link_type, source, target);
        if link_type == PARENT {
            return Ok(None);
        }
        let strategy = match self.router.resolve_strategy(link_type) {
            Ok(strategy) => strategy,
            Err(Error::UnknownRelationshipType(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let (Some(source), Some(target)) = (
            self.index.lookup(source).await?,
            self.index.lookup(target).await?,
        ) else {
            return Ok(None);
        };

        let repo = self.index.repo();
        let exists = strategy
            .find_links_by_issue(source.number, repo)
            .await?
            .iter()
            .any(|parsed| {
                !parsed.reversed
                    && parsed.link_type == link_type
                    && parsed.issue_number == target.number
                    && parsed.is_in(repo)
            });
        Ok(exists.then(|| link_between(&source, &target, link_type)))
    }

    async fn list_by_issue(
        &self,
        issue: &IssueId,
        link_type: Option<&str>,
    ) -> Result<Vec<IssueLink>> {
        let Some(me) = self.index.lookup(issue).await? else {
            return Ok(Vec::new());
        };
        let link_type = link_type.map(|t| if t == BLOCKED_BY { BLOCKS } else { t });

        let mut links = self.strategy_links(&me, link_type).await?;
        links.extend(self.incoming_markers(&me, link_type).await?);

        let mut seen = HashSet::new();
        links.retain(|link| seen.insert(link.id.clone()));
        Ok(links)
    }

    async fn delete(&self, id: &LinkId) -> Result<bool> {
        let Some(link) = self.find_by_id(id).await? else {
            return Ok(false);
        };
        self.remove(&link).await?;
        Ok(true)
    }

    async fn delete_by_issue_id(&self, issue: &IssueId) -> Result<usize> {
        let links = self.list_by_issue(issue, None).await?;
        for link in &links {
            self.remove(link).await?;
        }
        debug!(issue_id = %issue, removed = links.len(), "Removed links of issue");
        Ok(links.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RepoConfig;
    use crate::github::{FakeGitHub, GitHubApi};
    use crate::registry::{DUPLICATES, RELATES_TO, RelationshipRegistry};
    use crate::storage::LinkRepository;
    use chrono::Utc;

    struct Fixture {
        fake: Arc<FakeGitHub>,
        links: GitHubLinkRepository,
        ids: Vec<IssueId>,
    }

    async fn setup() -> Fixture {
        let repo = RepoConfig::new("acme", "widgets");
        let fake = Arc::new(FakeGitHub::new(repo.clone()));
        let mut ids = Vec::new();
        for title in ["Schema", "Migration", "Rollout", "Docs"] {
            ids.push(IssueId::new(fake.seed_issue(title, None).await.node_id));
        }
        let router = StrategyRouter::for_registry(
            fake.clone(),
            &RelationshipRegistry::with_defaults(),
            Vec::<String>::new(),
        )
        .unwrap();
        let index = Arc::new(IssueIndex::new(fake.clone(), repo));
        let links = GitHubLinkRepository::new(fake.clone(), index, router);
        Fixture { fake, links, ids }
    }

    fn link(source: &IssueId, target: &IssueId, link_type: &str) -> IssueLink {
        IssueLink::new(source.clone(), target.clone(), link_type, Utc::now())
    }

    #[tokio::test]
    async fn test_native_link_is_found_from_both_ends() {
        let f = setup().await;
        let created = f.links.create(link(&f.ids[0], &f.ids[1], BLOCKS)).await.unwrap();

        assert!(f.fake.is_blocked_by(2, 1).await);
        let from_source = f.links.list_by_issue(&f.ids[0], None).await.unwrap();
        let from_target = f.links.list_by_issue(&f.ids[1], None).await.unwrap();
        assert_eq!(from_source, vec![created.clone()]);
        assert_eq!(from_target, vec![created]);
    }

    #[tokio::test]
    async fn test_blocked_by_is_stored_as_blocks() {
        let f = setup().await;
        let created = f
            .links
            .create(link(&f.ids[1], &f.ids[0], BLOCKED_BY))
            .await
            .unwrap();

        assert_eq!(created.link_type, BLOCKS);
        assert_eq!(created.source_issue_id, f.ids[0]);
        assert!(f.fake.is_blocked_by(2, 1).await);
    }

    #[tokio::test]
    async fn test_comment_link_is_found_from_target_by_scan() {
        let f = setup().await;
        let created = f
            .links
            .create(link(&f.ids[2], &f.ids[3], DUPLICATES))
            .await
            .unwrap();

        let incoming = f.links.list_by_issue(&f.ids[3], None).await.unwrap();
        assert_eq!(incoming, vec![created.clone()]);
        let filtered = f
            .links
            .list_by_issue(&f.ids[3], Some(RELATES_TO))
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn test_link_ids_are_stable_across_reads() {
        let f = setup().await;
        let created = f.links.create(link(&f.ids[0], &f.ids[2], RELATES_TO)).await.unwrap();

        let by_id = f.links.find_by_id(&created.id).await.unwrap().unwrap();
        let by_ends = f
            .links
            .find(&f.ids[0], &f.ids[2], RELATES_TO)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id, created);
        assert_eq!(by_ends, created);
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let f = setup().await;
        assert!(f.links.find(&f.ids[0], &f.ids[1], BLOCKS).await.unwrap().is_none());
        assert!(f.links.find(&f.ids[0], &f.ids[1], "clones").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let f = setup().await;
        let created = f.links.create(link(&f.ids[0], &f.ids[1], DUPLICATES)).await.unwrap();

        assert!(f.links.delete(&created.id).await.unwrap());
        assert!(!f.links.delete(&created.id).await.unwrap());
        assert!(f.fake.body_of(1).await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_issue_id_leaves_unrelated_links() {
        let f = setup().await;
        f.links.create(link(&f.ids[0], &f.ids[1], BLOCKS)).await.unwrap();
        f.links.create(link(&f.ids[2], &f.ids[0], DUPLICATES)).await.unwrap();
        let unrelated = f.links.create(link(&f.ids[2], &f.ids[3], RELATES_TO)).await.unwrap();

        let removed = f.links.delete_by_issue_id(&f.ids[0]).await.unwrap();

        assert_eq!(removed, 2);
        assert!(f.links.list_by_issue(&f.ids[0], None).await.unwrap().is_empty());
        assert_eq!(
            f.links.list_by_issue(&f.ids[3], None).await.unwrap(),
            vec![unrelated]
        );
    }

    #[tokio::test]
    async fn test_foreign_repository_markers_are_skipped() {
        let f = setup().await;
        f.fake
            .set_body(1, Some("<!-- meridian:duplicates=other/repo#2 -->"))
            .await;

        assert!(f.links.list_by_issue(&f.ids[0], None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sub_issue_edges_are_not_links() {
        let f = setup().await;
        f.fake
            .add_sub_issue(f.fake.repo(), 1, 1_002, false)
            .await
            .unwrap();
        let blocks = f.links.create(link(&f.ids[0], &f.ids[1], BLOCKS)).await.unwrap();

        assert_eq!(f.links.list_by_issue(&f.ids[0], None).await.unwrap(), vec![blocks.clone()]);
        assert_eq!(f.links.list_by_issue(&f.ids[1], None).await.unwrap(), vec![blocks]);
        assert!(f.links.list_by_issue(&f.ids[1], Some(PARENT)).await.unwrap().is_empty());
        assert!(f.links.find(&f.ids[0], &f.ids[1], PARENT).await.unwrap().is_none());

        let hidden = IssueLink::new(f.ids[0].clone(), f.ids[1].clone(), PARENT, Utc::now());
        assert!(f.links.find_by_id(&hidden.id).await.unwrap().is_none());
        assert!(!f.links.delete(&hidden.id).await.unwrap());

        assert_eq!(f.links.delete_by_issue_id(&f.ids[1]).await.unwrap(), 1);
        assert_eq!(f.fake.parent_of(2).await, Some(1));
    }

    #[tokio::test]
    async fn test_parent_cannot_be_written_as_a_link() {
        let f = setup().await;

        let err = f
            .links
            .create(link(&f.ids[0], &f.ids[1], PARENT))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation { field: "link_type", .. }));
        assert_eq!(f.fake.parent_of(2).await, None);
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_not_found() {
        let f = setup().await;
        let err = f
            .links
            .create(link(&f.ids[0], &IssueId::new("I_ghost"), BLOCKS))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
