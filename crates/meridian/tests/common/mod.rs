//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use meridian::audit::MemoryAuditLog;
use meridian::domain::{IssueId, NewIssue, RepoConfig};
use meridian::github::{FakeGitHub, GitHubApi};
use meridian::registry::RelationshipRegistry;
use meridian::service::{HierarchyService, LinkService};
use meridian::storage::github::new_github_backend;
use meridian::storage::in_memory::new_in_memory_backend;
use meridian::storage::{Backend, IssueRepository};
use meridian::strategy::StrategyRouter;
use std::sync::Arc;

/// Which backing store a harness runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    InMemory,
    GitHub,
}

/// Services wired to one fresh backend.
pub struct Harness {
    pub backend: Backend,
    pub links: LinkService,
    pub hierarchy: HierarchyService,
    pub audit: Arc<MemoryAuditLog>,
    /// Set for [`Store::GitHub`].
    pub fake: Option<Arc<FakeGitHub>>,
}

impl Harness {
    pub fn new(store: Store) -> Self {
        Self::with_registry(store, RelationshipRegistry::with_defaults())
    }

    pub fn with_registry(store: Store, registry: RelationshipRegistry) -> Self {
        let (backend, fake) = match store {
            Store::InMemory => (new_in_memory_backend("test".to_string()), None),
            Store::GitHub => {
                let fake = Arc::new(FakeGitHub::new(RepoConfig::new("acme", "widgets")));
                let client: Arc<dyn GitHubApi> = fake.clone();
                let router =
                    StrategyRouter::for_registry(client.clone(), &registry, Vec::<String>::new())
                        .expect("Failed to build strategy router");
                let backend = new_github_backend(client, fake.repo().clone(), router);
                (backend, Some(fake))
            }
        };
        let audit = Arc::new(MemoryAuditLog::new());
        let links = LinkService::for_backend(&backend, Arc::new(registry));
        let hierarchy = HierarchyService::new(backend.issues.clone(), audit.clone());
        Self {
            backend,
            links,
            hierarchy,
            audit,
            fake,
        }
    }

    /// Create one issue per title, returning ids in order.
    pub async fn issues(&self, titles: &[&str]) -> Vec<IssueId> {
        let mut ids = Vec::with_capacity(titles.len());
        for title in titles {
            let issue = self
                .backend
                .issues
                .create(NewIssue::titled(*title))
                .await
                .expect("Failed to create issue");
            ids.push(issue.id);
        }
        ids
    }
}
