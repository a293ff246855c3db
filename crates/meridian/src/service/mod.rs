//! Use cases over the repositories.
//!
//! - [`LinkService`]: create, find, list and delete typed links
//! - [`HierarchyService`]: move issues in the parent/child tree
//!
//! Both hold `Arc`s to their collaborators and take `&self`, so one instance
//! serves concurrent requests.

mod hierarchy;
mod links;

pub use hierarchy::{HierarchyService, MAX_DEPTH};
pub use links::LinkService;
