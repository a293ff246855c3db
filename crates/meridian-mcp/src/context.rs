//! Workspace context management for the MCP server.
//!
//! This module handles:
//! - Workspace detection (walking up to find `.meridian/`)
//! - Path canonicalization
//! - Per-workspace backend and service instances
//!
//! A [`Workspace`] is immutable once built and its services synchronize
//! internally, so tools clone the `Arc` out of the context and release the
//! context lock before doing any I/O.

use crate::error::{Error, Result};
use meridian::audit::TracingAuditLog;
use meridian::config::{self, MERIDIAN_DIR_NAME, MeridianConfig};
use meridian::registry::RelationshipRegistry;
use meridian::service::{HierarchyService, LinkService};
use meridian::storage::{Backend, StorageBackend, create_backend};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Maximum number of cached workspaces to prevent resource exhaustion.
///
/// When this limit is reached, the oldest workspace is evicted from cache.
const MAX_CACHED_WORKSPACES: usize = 32;

/// Services bound to one workspace.
pub struct Workspace {
    /// Human-readable backend description (`memory` or `github:owner/repo`).
    pub backend_name: String,

    /// Repositories of the workspace's backing store.
    pub backend: Backend,

    /// Link use cases.
    pub links: LinkService,

    /// Reparenting.
    pub hierarchy: HierarchyService,
}

impl Workspace {
    /// Wire services over a backend.
    #[must_use]
    pub fn new(backend_name: String, backend: Backend, registry: RelationshipRegistry) -> Self {
        let links = LinkService::for_backend(&backend, Arc::new(registry));
        let hierarchy = HierarchyService::new(backend.issues.clone(), Arc::new(TracingAuditLog));
        Self {
            backend_name,
            backend,
            links,
            hierarchy,
        }
    }

    /// The relationship registry of this workspace.
    #[must_use]
    pub fn registry(&self) -> &RelationshipRegistry {
        self.links.registry()
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("backend_name", &self.backend_name)
            .finish_non_exhaustive()
    }
}

/// Global context state for the MCP server.
///
/// Manages workspace contexts and service instances for multi-workspace support.
#[derive(Debug, Default)]
pub struct Context {
    /// The current active workspace root.
    current_workspace: Option<PathBuf>,

    /// Per-workspace services (limited to [`MAX_CACHED_WORKSPACES`]).
    workspaces: HashMap<PathBuf, Arc<Workspace>>,

    /// Insertion order for FIFO cache eviction.
    cache_order: VecDeque<PathBuf>,
}

impl Context {
    /// Create a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current workspace root.
    ///
    /// This will:
    /// 1. Canonicalize the path (resolves `..`, symlinks, validates existence)
    /// 2. Validate the path is safe (no null bytes, is absolute)
    /// 3. Verify a `.meridian/` directory exists
    /// 4. Create or retrieve the workspace services
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace path doesn't exist, has no `.meridian/`
    /// directory, its configuration is invalid, or backend creation fails.
    pub async fn set_workspace(&mut self, workspace_root: &Path) -> Result<WorkspaceInfo> {
        debug!(path = %workspace_root.display(), "Setting workspace");

        let canonical = workspace_root
            .canonicalize()
            .map_err(|e| Error::WorkspaceNotFound {
                path: workspace_root.display().to_string(),
                source: Some(e),
            })?;
        validate_path(&canonical)?;

        if !canonical.join(MERIDIAN_DIR_NAME).is_dir() {
            return Err(Error::NoMeridianDirectory(canonical.display().to_string()));
        }

        if let Some(workspace) = self.workspaces.get(&canonical) {
            debug!("Using cached workspace");
            let info = WorkspaceInfo {
                workspace_root: canonical.clone(),
                backend: workspace.backend_name.clone(),
            };
            self.current_workspace = Some(canonical);
            return Ok(info);
        }

        let workspace = load_workspace(&canonical).await?;
        let info = WorkspaceInfo {
            workspace_root: canonical.clone(),
            backend: workspace.backend_name.clone(),
        };

        while self.workspaces.len() >= MAX_CACHED_WORKSPACES {
            self.evict_oldest();
        }
        self.workspaces.insert(canonical.clone(), Arc::new(workspace));
        self.cache_order.push_back(canonical.clone());
        self.current_workspace = Some(canonical);

        Ok(info)
    }

    /// Evict the oldest cached workspace to make room for new entries.
    fn evict_oldest(&mut self) {
        if let Some(oldest) = self.cache_order.pop_front() {
            self.workspaces.remove(&oldest);
            if self.current_workspace.as_ref() == Some(&oldest) {
                self.current_workspace = None;
            }
            debug!(workspace = %oldest.display(), "Evicted workspace from cache");
        }
    }

    /// Get the current workspace root.
    #[must_use]
    pub fn current_workspace(&self) -> Option<&PathBuf> {
        self.current_workspace.as_ref()
    }

    /// Get the services of a specific workspace, or the current one if not specified.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No context is set and no workspace path is provided
    /// - The workspace path doesn't exist (with IO error context)
    /// - The workspace exists but wasn't initialized via `set_workspace()`
    pub fn workspace_for(&self, workspace_root: Option<&Path>) -> Result<Arc<Workspace>> {
        let workspace = match workspace_root {
            Some(path) => path.canonicalize().map_err(|e| Error::WorkspaceNotFound {
                path: path.display().to_string(),
                source: Some(e),
            })?,
            None => self.current_workspace.clone().ok_or(Error::NoContext)?,
        };

        self.workspaces
            .get(&workspace)
            .cloned()
            .ok_or_else(|| Error::WorkspaceNotInitialized(workspace.display().to_string()))
    }

    /// Discover and set the workspace by walking up from the given directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no `.meridian/` directory is found in the path
    /// hierarchy, or if backend creation fails.
    pub async fn discover_and_set_workspace(&mut self, start: &Path) -> Result<WorkspaceInfo> {
        let workspace_root = discover_workspace(start)?;
        self.set_workspace(&workspace_root).await
    }

    /// Register a prebuilt workspace without reading configuration.
    ///
    /// Bypasses cache eviction; intended for tests.
    pub fn insert_workspace(&mut self, workspace_root: PathBuf, workspace: Workspace) {
        self.current_workspace = Some(workspace_root.clone());
        self.workspaces
            .insert(workspace_root.clone(), Arc::new(workspace));
        self.cache_order.push_back(workspace_root);
    }

    /// Number of cached workspaces.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.workspaces.len()
    }
}

/// Information about a workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    /// The canonical path to the workspace root.
    pub workspace_root: PathBuf,

    /// Backend description.
    pub backend: String,
}

async fn load_workspace(root: &Path) -> Result<Workspace> {
    let config_path = config::config_path(root);
    let config = MeridianConfig::load(&config_path)
        .await
        .map_err(|e| Error::ConfigLoad {
            path: config_path.display().to_string(),
            reason: e.to_string(),
        })?;
    debug!(prefix = %config.issue_prefix, backend = %config.storage.backend, "Loaded config");

    let registry = config.registry()?;
    let storage = config.to_backend()?;
    let backend_name = match &storage {
        StorageBackend::InMemory { .. } => "memory".to_string(),
        StorageBackend::GitHub { repo, .. } => format!("github:{repo}"),
    };
    let backend = create_backend(storage, &registry)?;
    Ok(Workspace::new(backend_name, backend, registry))
}

/// Validate that a path is safe to use as a workspace.
fn validate_path(path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Workspace path must be absolute",
        )));
    }

    if path.to_string_lossy().contains('\0') {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Workspace path contains invalid characters",
        )));
    }

    if path
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Workspace path contains parent directory references",
        )));
    }

    Ok(())
}

/// Discover a meridian workspace by walking up from the given directory.
///
/// Returns the canonicalized workspace root (directory containing `.meridian/`).
///
/// # Errors
///
/// Returns `Error::NoMeridianDirectory` if no `.meridian/` directory is found,
/// or `Error::WorkspaceNotFound` if the path cannot be canonicalized.
pub fn discover_workspace(start: &Path) -> Result<PathBuf> {
    let root = config::find_workspace_root(start)
        .ok_or_else(|| Error::NoMeridianDirectory(start.display().to_string()))?;
    // Resolve symlinks (e.g., /var -> /private/var on macOS)
    root.canonicalize().map_err(|e| Error::WorkspaceNotFound {
        path: root.display().to_string(),
        source: Some(e),
    })
}
