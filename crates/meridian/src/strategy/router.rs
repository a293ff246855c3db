//! Relationship type → persistence strategy.

use super::{
    BLOCKED_BY, CommentStrategy, DependencyStrategy, LinkStrategy, PARENT, SubIssueStrategy,
};
use crate::error::{Error, Result};
use crate::github::GitHubApi;
use crate::registry::{BLOCKS, RelationshipRegistry, is_valid_type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Whether `name` is stored natively rather than in body markers.
#[must_use]
pub fn is_native(name: &str) -> bool {
    matches!(name, BLOCKS | BLOCKED_BY | PARENT)
}

/// Picks the strategy that persists a given relationship type.
///
/// Native types are fixed; everything else is looked up in a table of
/// comment-backed types registered at construction.
#[derive(Clone)]
pub struct StrategyRouter {
    client: Arc<dyn GitHubApi>,
    dependency: Arc<LinkStrategy>,
    sub_issue: Arc<LinkStrategy>,
    comment: BTreeMap<String, Arc<LinkStrategy>>,
}

impl fmt::Debug for StrategyRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRouter")
            .field("comment", &self.comment.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl StrategyRouter {
    /// A router with the native strategies and an empty comment table.
    pub fn new(client: Arc<dyn GitHubApi>) -> Self {
        Self {
            dependency: Arc::new(LinkStrategy::Dependency(DependencyStrategy::new(
                client.clone(),
            ))),
            sub_issue: Arc::new(LinkStrategy::SubIssue(SubIssueStrategy::new(client.clone()))),
            comment: BTreeMap::new(),
            client,
        }
    }

    /// A router serving every registry type plus `extra_comment_types`.
    ///
    /// Registry types without a native mechanism get a comment strategy.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if an extra name is malformed.
    pub fn for_registry<I, S>(
        client: Arc<dyn GitHubApi>,
        registry: &RelationshipRegistry,
        extra_comment_types: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut router = Self::new(client);
        for rel in registry.iter().filter(|rel| !is_native(&rel.name)) {
            router.register_comment_type(rel.name.clone())?;
        }
        for name in extra_comment_types {
            router.register_comment_type(name)?;
        }
        Ok(router)
    }

    /// Route `name` to a new comment strategy.
    ///
    /// Native names and names already in the table are left as they are.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the name is malformed.
    pub fn register_comment_type(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !is_valid_type_name(&name) {
            return Err(Error::validation(
                "comment_type",
                format!("'{name}' is not a valid relationship type name"),
            ));
        }
        if is_native(&name) || self.comment.contains_key(&name) {
            return Ok(());
        }
        let strategy = Arc::new(LinkStrategy::Comment(CommentStrategy::new(
            self.client.clone(),
            name.clone(),
        )));
        self.comment.insert(name, strategy);
        Ok(())
    }

    /// Route `name` to an existing strategy instance.
    ///
    /// The same instance may be registered under several names;
    /// [`Self::all_strategies`] still yields it once.
    pub fn register(&mut self, name: impl Into<String>, strategy: Arc<LinkStrategy>) {
        self.comment.insert(name.into(), strategy);
    }

    /// The strategy that persists `name`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownRelationshipType` if no strategy serves it.
    pub fn resolve_strategy(&self, name: &str) -> Result<Arc<LinkStrategy>> {
        let strategy = match name {
            BLOCKS | BLOCKED_BY => Some(&self.dependency),
            PARENT => Some(&self.sub_issue),
            other => self.comment.get(other),
        };
        let strategy = strategy.ok_or_else(|| Error::UnknownRelationshipType(name.to_string()))?;
        debug!(link_type = name, strategy = strategy.name(), "Resolved link strategy");
        Ok(Arc::clone(strategy))
    }

    /// Every distinct strategy instance: dependency, sub-issue, then the
    /// comment table in name order.
    #[must_use]
    pub fn all_strategies(&self) -> Vec<Arc<LinkStrategy>> {
        let mut all: Vec<Arc<LinkStrategy>> = Vec::with_capacity(2 + self.comment.len());
        let candidates = [&self.dependency, &self.sub_issue]
            .into_iter()
            .chain(self.comment.values());
        for strategy in candidates {
            if !all.iter().any(|seen| Arc::ptr_eq(seen, strategy)) {
                all.push(Arc::clone(strategy));
            }
        }
        all
    }

    /// Names routed to comment strategies, in name order.
    pub fn comment_types(&self) -> impl Iterator<Item = &str> {
        self.comment.keys().map(String::as_str)
    }
}
