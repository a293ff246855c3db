//! MCP server for meridian issue relationships.
//!
//! This crate provides an MCP (Model Context Protocol) server that exposes
//! the meridian link and hierarchy use cases to AI assistants.
//!
//! # Architecture
//!
//! The server uses the `rmcp` crate for MCP protocol handling and wraps the
//! `LinkService` and `HierarchyService` of the meridian crate, one pair per
//! workspace.
//!
//! # Tools
//!
//! ## Context Management
//! - `set_context` - Set the workspace root for all operations
//! - `where_am_i` - Show current workspace context
//! - `relationship_types` - List the registered relationship types
//!
//! ## Issues
//! - `create_issue` - Create a new issue
//! - `show_issue` - Show an issue with its children and links
//! - `delete_issue` - Purge an issue's links, then delete it
//! - `reparent` - Move an issue within the hierarchy
//!
//! ## Links
//! - `link` - Link two issues
//! - `find_link` - Look up the link between two issues
//! - `list_links` - List links touching an issue
//! - `unlink` - Remove a link by id

pub mod context;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::MeridianMcpServer;
