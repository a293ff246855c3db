//! Workspace configuration.
//!
//! A meridian workspace is a directory containing `.meridian/config.yaml`:
//!
//! ```yaml
//! issue-prefix: mer
//! storage:
//!   backend: github
//!   github:
//!     owner: acme
//!     repo: widgets
//!     token-env: GITHUB_TOKEN
//! relationship-types:
//!   - name: caused-by
//!     forward-label: was caused by
//!     inverse-label: caused
//! comment-types:
//!   - mentions
//! ```

use crate::domain::RepoConfig;
use crate::error::{Error, Result};
use crate::github::rest::DEFAULT_API_URL;
use crate::registry::{RelationshipRegistry, RelationshipType};
use crate::storage::StorageBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Default issue prefix if none specified
pub const DEFAULT_PREFIX: &str = "mer";

/// Name of the workspace directory
pub const MERIDIAN_DIR_NAME: &str = ".meridian";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Environment variable holding the GitHub token unless configured otherwise
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Minimum prefix length
pub const MIN_PREFIX_LENGTH: usize = 2;

/// Maximum prefix length
pub const MAX_PREFIX_LENGTH: usize = 20;

/// Maximum directory depth to traverse when searching for a workspace root
pub const MAX_TRAVERSAL_DEPTH: usize = 256;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct MeridianConfig {
    /// Issue ID prefix for the in-memory backend (e.g., "mer" for "mer-a1b2c3")
    pub issue_prefix: String,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Relationship types beyond the three defaults
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationship_types: Vec<RelationshipTypeConfig>,

    /// Extra names persisted as body markers on GitHub
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comment_types: Vec<String>,
}

/// Storage configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Storage backend type: `memory` or `github`
    pub backend: String,

    /// GitHub settings, required for the `github` backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GitHubConfig>,
}

/// GitHub backend settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// Repository owner
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// REST API base URL (GitHub Enterprise)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Environment variable to read the token from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

/// A relationship type as written in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct RelationshipTypeConfig {
    /// Unique key
    pub name: String,

    /// Label shown from the source
    pub forward_label: String,

    /// Label shown from the target; defaults to the forward label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_label: Option<String>,

    /// Whether A→B and B→A are the same relationship
    #[serde(default)]
    pub symmetric: bool,
}

impl From<RelationshipTypeConfig> for RelationshipType {
    fn from(config: RelationshipTypeConfig) -> Self {
        let inverse_label = config
            .inverse_label
            .unwrap_or_else(|| config.forward_label.clone());
        Self {
            name: config.name,
            forward_label: config.forward_label,
            inverse_label,
            symmetric: config.symmetric,
        }
    }
}

impl MeridianConfig {
    /// Create an in-memory configuration with the given prefix
    pub fn new(prefix: &str) -> Self {
        Self {
            issue_prefix: prefix.to_string(),
            storage: StorageConfig {
                backend: "memory".to_string(),
                github: None,
            },
            relationship_types: Vec::new(),
            comment_types: Vec::new(),
        }
    }

    /// Create a GitHub configuration for `owner/repo`
    pub fn github(prefix: &str, owner: &str, repo: &str) -> Self {
        let mut config = Self::new(prefix);
        config.storage = StorageConfig {
            backend: "github".to_string(),
            github: Some(GitHubConfig {
                owner: owner.to_string(),
                repo: repo.to_string(),
                api_url: None,
                token_env: None,
            }),
        };
        config
    }

    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Config` if
    /// it is not valid YAML for this structure.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        serde_yaml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// The relationship registry: defaults plus configured types.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if a configured type is malformed or
    /// redefines a default.
    pub fn registry(&self) -> Result<RelationshipRegistry> {
        RelationshipRegistry::with_extra(
            self.relationship_types
                .iter()
                .cloned()
                .map(RelationshipType::from),
        )
    }

    /// The storage backend this configuration selects.
    ///
    /// The GitHub token is read from the configured environment variable
    /// (`GITHUB_TOKEN` by default); a missing variable means unauthenticated
    /// requests.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unknown backend name, a `github`
    /// backend without its section, or an invalid prefix.
    pub fn to_backend(&self) -> Result<StorageBackend> {
        match self.storage.backend.as_str() {
            "memory" => {
                validate_prefix(&self.issue_prefix)?;
                Ok(StorageBackend::InMemory {
                    prefix: self.issue_prefix.clone(),
                })
            }
            "github" => {
                let github = self.storage.github.as_ref().ok_or_else(|| {
                    Error::Config("storage.github is required for the github backend".to_string())
                })?;
                if github.owner.trim().is_empty() || github.repo.trim().is_empty() {
                    return Err(Error::Config(
                        "storage.github.owner and storage.github.repo cannot be empty".to_string(),
                    ));
                }
                let token_env = github.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV);
                Ok(StorageBackend::GitHub {
                    repo: RepoConfig::new(&github.owner, &github.repo),
                    api_url: github
                        .api_url
                        .clone()
                        .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                    token: std::env::var(token_env).ok().filter(|t| !t.is_empty()),
                    comment_types: self.comment_types.clone(),
                })
            }
            other => Err(Error::Config(format!(
                "Unknown storage backend '{other}' (expected 'memory' or 'github')"
            ))),
        }
    }
}

impl Default for MeridianConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Validate issue ID prefix format.
///
/// Requirements:
/// - 2-20 characters
/// - Alphanumeric only (letters and digits)
///
/// # Errors
///
/// Returns `Error::Config` describing the first violated rule.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.len() < MIN_PREFIX_LENGTH {
        return Err(Error::Config(format!(
            "Prefix must be at least {MIN_PREFIX_LENGTH} characters"
        )));
    }

    if prefix.len() > MAX_PREFIX_LENGTH {
        return Err(Error::Config(format!(
            "Prefix cannot exceed {MAX_PREFIX_LENGTH} characters"
        )));
    }

    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::Config(
            "Prefix must contain only alphanumeric characters".to_string(),
        ));
    }

    Ok(())
}

/// Create `.meridian/config.yaml` under `base_dir`.
///
/// Returns the path of the written configuration file.
///
/// # Errors
///
/// Returns `Error::Config` if the workspace already exists, and `Error::Io`
/// if the directory or file cannot be written.
pub async fn init(base_dir: &Path, config: &MeridianConfig) -> Result<PathBuf> {
    let meridian_dir = base_dir.join(MERIDIAN_DIR_NAME);
    if meridian_dir.exists() {
        return Err(Error::Config(format!(
            "Meridian is already initialized in this directory. Found existing '{MERIDIAN_DIR_NAME}'"
        )));
    }

    fs::create_dir_all(&meridian_dir).await?;
    let config_file = meridian_dir.join(CONFIG_FILE_NAME);
    config.save(&config_file).await?;
    Ok(config_file)
}

/// Path of the configuration file of the workspace rooted at `root`.
#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    root.join(MERIDIAN_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Find the workspace root by searching up the directory tree.
///
/// Returns the directory containing `.meridian/`, or `None` if none is found
/// within [`MAX_TRAVERSAL_DEPTH`] levels.
#[must_use]
pub fn find_workspace_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    let mut depth = 0;

    loop {
        if current.join(MERIDIAN_DIR_NAME).exists() {
            return Some(current);
        }

        depth += 1;
        if depth > MAX_TRAVERSAL_DEPTH || !current.pop() {
            return None;
        }
    }
}
