//! In-memory storage backend using HashMap and petgraph.
//!
//! All data is held in RAM and **lost when the process exits**. It is
//! suitable for tests, demos and short-lived agent sessions.
//!
//! # Architecture
//!
//! - `HashMap<IssueId, Issue>` for O(1) issue lookups
//! - `petgraph::StableDiGraph<IssueId, IssueLink>` holding links as edges
//! - `HashMap<IssueId, NodeIndex>` mapping issues to graph nodes
//! - Hash-based issue IDs (`{prefix}-{6 chars}`) with collision retry
//!
//! ## Edge Direction Convention
//!
//! Every edge runs from the link's source to its target and carries the full
//! [`IssueLink`](crate::domain::IssueLink) as its weight. Symmetric links
//! arrive already in canonical order, so they are stored once.
//!
//! The parent pointer is not an edge; it lives on the issue itself.
//!
//! # Thread Safety
//!
//! The store is wrapped in `Arc<Mutex<InMemoryStoreInner>>`. Every operation
//! takes the lock once and releases it before returning; nothing calls out
//! while holding it.

mod graph;
mod inner;
mod trait_impl;

use super::Backend;
use inner::InMemoryStoreInner;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Thread-safe in-memory store.
///
/// Implements both [`IssueRepository`](super::IssueRepository) and
/// [`LinkRepository`](super::LinkRepository) via `trait_impl.rs`.
pub(crate) type InMemoryStore = Arc<Mutex<InMemoryStoreInner>>;

/// Create an in-memory backend whose issue and link repositories share one
/// store.
///
/// # Example
///
/// ```
/// use meridian::storage::in_memory::new_in_memory_backend;
///
/// let backend = new_in_memory_backend("mer".to_string());
/// # let _ = backend;
/// ```
#[must_use]
pub fn new_in_memory_backend(prefix: String) -> Backend {
    let store: InMemoryStore = Arc::new(Mutex::new(InMemoryStoreInner::new(prefix)));
    Backend {
        issues: Arc::new(store.clone()),
        links: Arc::new(store),
    }
}
