//! Error types for the meridian MCP server.

use meridian::error::ErrorKind;
use rmcp::ErrorData as McpError;
use thiserror::Error;

/// Errors that can occur in the meridian MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// No workspace context has been set.
    #[error("No workspace context set. Call set_context first.")]
    NoContext,

    /// The specified workspace was not found or path is invalid.
    #[error("Workspace not found: {path}")]
    WorkspaceNotFound {
        /// The path that was not found.
        path: String,
        /// The underlying IO error, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// Workspace exists but was not initialized via `set_context`.
    #[error("Workspace not initialized: {0}. Call set_context first.")]
    WorkspaceNotInitialized(String),

    /// Failed to discover a meridian workspace.
    #[error("No .meridian directory found in {0} or parent directories")]
    NoMeridianDirectory(String),

    /// The workspace configuration could not be loaded.
    #[error("Failed to load config from {path}: {reason}")]
    ConfigLoad {
        /// Path of the configuration file.
        path: String,
        /// Why loading failed.
        reason: String,
    },

    /// An error from the meridian domain layer.
    #[error(transparent)]
    Meridian(#[from] meridian::error::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        match err {
            Error::Meridian(inner) => {
                let message = inner.public_message();
                match inner.kind() {
                    ErrorKind::NotFound => Self::resource_not_found(message, None),
                    ErrorKind::Validation | ErrorKind::Conflict => {
                        Self::invalid_params(message, None)
                    }
                    ErrorKind::Authorization => Self::invalid_request(message, None),
                    ErrorKind::Domain | ErrorKind::Internal => {
                        tracing::error!(error = %inner, "Tool call failed");
                        Self::internal_error(message, None)
                    }
                }
            }
            Error::NoContext
            | Error::WorkspaceNotFound { .. }
            | Error::WorkspaceNotInitialized(_)
            | Error::NoMeridianDirectory(_) => Self::invalid_request(err.to_string(), None),
            Error::ConfigLoad { .. } | Error::Io(_) | Error::Json(_) => {
                Self::internal_error(err.to_string(), None)
            }
        }
    }
}

/// Result type for meridian MCP operations.
pub type Result<T> = std::result::Result<T, Error>;
