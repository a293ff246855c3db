//! Meridian - typed relationships between issues.
//!
//! This crate layers a registry of relationship types, issue-to-issue links
//! and a validated parent/child hierarchy over two backing stores:
//!
//! - an in-memory store for tests and embedding
//! - a GitHub repository, where links use native dependencies and sub-issues
//!   when the relationship has a native equivalent and fall back to markers
//!   in the issue body otherwise

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod audit;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod github;
pub mod ids;
pub mod registry;
pub mod service;
pub mod storage;
pub mod strategy;
