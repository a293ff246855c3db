//! Repository trait implementations for the in-memory store.

use super::InMemoryStore;
use super::graph::{edge_by_id, edges_touching, find_edge};
use crate::domain::{Issue, IssueFilter, IssueId, IssueLink, IssueState, LinkId, NewIssue};
use crate::error::{Error, Result};
use crate::storage::{IssueRepository, LinkRepository};
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

#[async_trait]
impl IssueRepository for InMemoryStore {
    async fn create(&self, new_issue: NewIssue) -> Result<Issue> {
        new_issue.validate()?;

        let mut inner = self.lock().await;
        let number = inner.next_number;
        inner.next_number += 1;
        let id = inner.id_generator.generate(&new_issue.title, number);

        let now = Utc::now();
        let issue = Issue {
            id: id.clone(),
            number,
            title: new_issue.title.trim().to_string(),
            body: new_issue.body,
            state: IssueState::Open,
            parent_id: None,
            created_at: now,
            updated_at: now,
        };

        let node = inner.graph.add_node(id.clone());
        inner.node_map.insert(id.clone(), node);
        inner.issues.insert(id, issue.clone());

        Ok(issue)
    }

    async fn get(&self, id: &IssueId) -> Result<Option<Issue>> {
        let inner = self.lock().await;
        Ok(inner.issues.get(id).cloned())
    }

    async fn list(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let inner = self.lock().await;
        let mut issues: Vec<Issue> = inner
            .issues
            .values()
            .filter(|issue| filter.matches(issue))
            .cloned()
            .collect();
        issues.sort_by_key(|issue| issue.number);
        if let Some(limit) = filter.limit {
            issues.truncate(limit);
        }
        Ok(issues)
    }

    async fn children(&self, id: &IssueId) -> Result<Vec<Issue>> {
        let inner = self.lock().await;
        if !inner.issues.contains_key(id) {
            return Err(Error::issue_not_found(id.as_str()));
        }
        let mut children: Vec<Issue> = inner
            .issues
            .values()
            .filter(|issue| issue.parent_id.as_ref() == Some(id))
            .cloned()
            .collect();
        children.sort_by_key(|issue| issue.number);
        Ok(children)
    }

    async fn set_parent(&self, id: &IssueId, parent: Option<&IssueId>) -> Result<Issue> {
        let mut inner = self.lock().await;
        if let Some(parent) = parent {
            if !inner.issues.contains_key(parent) {
                return Err(Error::issue_not_found(parent.as_str()));
            }
        }

        let issue = inner
            .issues
            .get_mut(id)
            .ok_or_else(|| Error::issue_not_found(id.as_str()))?;
        issue.parent_id = parent.cloned();
        issue.updated_at = Utc::now();

        Ok(issue.clone())
    }

    async fn delete(&self, id: &IssueId) -> Result<()> {
        let mut inner = self.lock().await;

        let node = inner.node(id)?;
        // Removing the node drops every edge touching it.
        inner.graph.remove_node(node);
        inner.node_map.remove(id);
        inner.issues.remove(id);
        inner.id_generator.release(id);

        let now = Utc::now();
        for issue in inner.issues.values_mut() {
            if issue.parent_id.as_ref() == Some(id) {
                issue.parent_id = None;
                issue.updated_at = now;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl LinkRepository for InMemoryStore {
    async fn create(&self, link: IssueLink) -> Result<IssueLink> {
        let mut inner = self.lock().await;

        let source = inner.node(&link.source_issue_id)?;
        let target = inner.node(&link.target_issue_id)?;

        if find_edge(&inner.graph, source, target, &link.link_type).is_some() {
            return Err(Error::Conflict(format!(
                "link {} -{}-> {} already exists",
                link.source_issue_id, link.link_type, link.target_issue_id
            )));
        }

        inner.graph.add_edge(source, target, link.clone());
        debug!(link_id = %link.id, link_type = %link.link_type, "Stored link");
        Ok(link)
    }

    async fn find_by_id(&self, id: &LinkId) -> Result<Option<IssueLink>> {
        let inner = self.lock().await;
        Ok(edge_by_id(&inner.graph, id).and_then(|edge| inner.graph.edge_weight(edge).cloned()))
    }

    async fn find(
        &self,
        source: &IssueId,
        target: &IssueId,
        link_type: &str,
    ) -> Result<Option<IssueLink>> {
        let inner = self.lock().await;
        let (Some(&source), Some(&target)) = (inner.node_map.get(source), inner.node_map.get(target))
        else {
            return Ok(None);
        };
        Ok(find_edge(&inner.graph, source, target, link_type)
            .and_then(|edge| inner.graph.edge_weight(edge).cloned()))
    }

    async fn list_by_issue(
        &self,
        issue: &IssueId,
        link_type: Option<&str>,
    ) -> Result<Vec<IssueLink>> {
        let inner = self.lock().await;
        let Some(&node) = inner.node_map.get(issue) else {
            return Ok(Vec::new());
        };
        Ok(edges_touching(&inner.graph, node, link_type)
            .into_iter()
            .filter_map(|edge| inner.graph.edge_weight(edge).cloned())
            .collect())
    }

    async fn delete(&self, id: &LinkId) -> Result<bool> {
        let mut inner = self.lock().await;
        match edge_by_id(&inner.graph, id) {
            Some(edge) => {
                inner.graph.remove_edge(edge);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_issue_id(&self, issue: &IssueId) -> Result<usize> {
        let mut inner = self.lock().await;
        let Some(&node) = inner.node_map.get(issue) else {
            return Ok(0);
        };
        let edges = edges_touching(&inner.graph, node, None);
        for edge in &edges {
            inner.graph.remove_edge(*edge);
        }
        debug!(issue_id = %issue, removed = edges.len(), "Removed links of issue");
        Ok(edges.len())
    }
}

#[cfg(test)]
mod tests {
    use super::super::new_in_memory_backend;
    use crate::domain::{IssueFilter, IssueLink, IssueState, NewIssue};
    use crate::error::ErrorKind;
    use chrono::Utc;

    #[tokio::test]
    async fn test_numbers_are_sequential() {
        let backend = new_in_memory_backend("mer".to_string());
        let a = backend.issues.create(NewIssue::titled("A")).await.unwrap();
        let b = backend.issues.create(NewIssue::titled("B")).await.unwrap();
        assert_eq!((a.number, b.number), (1, 2));
        assert_eq!(a.state, IssueState::Open);
    }

    #[tokio::test]
    async fn test_create_validates_title() {
        let backend = new_in_memory_backend("mer".to_string());
        let err = backend.issues.create(NewIssue::titled("")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_duplicate_link_is_conflict() {
        let backend = new_in_memory_backend("mer".to_string());
        let a = backend.issues.create(NewIssue::titled("A")).await.unwrap();
        let b = backend.issues.create(NewIssue::titled("B")).await.unwrap();
        let link = IssueLink::new(a.id.clone(), b.id.clone(), "blocks", Utc::now());

        backend.links.create(link.clone()).await.unwrap();
        let err = backend.links.create(link).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_link_to_missing_issue_is_not_found() {
        let backend = new_in_memory_backend("mer".to_string());
        let a = backend.issues.create(NewIssue::titled("A")).await.unwrap();
        let link = IssueLink::new(a.id, "mer-ghost".into(), "blocks", Utc::now());

        let err = backend.links.create(link).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_issue_drops_links_and_orphans_children() {
        let backend = new_in_memory_backend("mer".to_string());
        let parent = backend.issues.create(NewIssue::titled("Epic")).await.unwrap();
        let child = backend.issues.create(NewIssue::titled("Story")).await.unwrap();
        backend
            .issues
            .set_parent(&child.id, Some(&parent.id))
            .await
            .unwrap();
        backend
            .links
            .create(IssueLink::new(
                parent.id.clone(),
                child.id.clone(),
                "blocks",
                Utc::now(),
            ))
            .await
            .unwrap();

        backend.issues.delete(&parent.id).await.unwrap();

        let child = backend.issues.get(&child.id).await.unwrap().unwrap();
        assert_eq!(child.parent_id, None);
        assert!(backend.links.list_by_issue(&child.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_parent_and_limits() {
        let backend = new_in_memory_backend("mer".to_string());
        let parent = backend.issues.create(NewIssue::titled("Epic")).await.unwrap();
        for title in ["One", "Two", "Three"] {
            let child = backend.issues.create(NewIssue::titled(title)).await.unwrap();
            backend
                .issues
                .set_parent(&child.id, Some(&parent.id))
                .await
                .unwrap();
        }

        let filter = IssueFilter {
            parent_id: Some(parent.id.clone()),
            limit: Some(2),
            ..IssueFilter::default()
        };
        let listed = backend.issues.list(&filter).await.unwrap();
        let titles: Vec<_> = listed.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["One", "Two"]);
        assert_eq!(backend.issues.children(&parent.id).await.unwrap().len(), 3);
    }
}
