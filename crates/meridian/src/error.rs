//! Error types for meridian operations.
//!
//! Every failure that leaves a repository, strategy, or use case is one of the
//! variants below. [`Error::kind`] collapses them into the coarse taxonomy the
//! transport layers map onto their own status codes.

use std::io;
use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced issue or link does not exist.
    NotFound,

    /// Malformed input (self-link, unknown type, bad identifier, ...).
    Validation,

    /// Duplicate edge after normalization.
    Conflict,

    /// The backing store rejected the credential.
    Authorization,

    /// Backing-store failure carrying a machine-readable code.
    Domain,

    /// Unexpected local failure (I/O, serialization, transport).
    Internal,
}

/// The error type for meridian operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type ("issue", "link", ...).
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// Input failed validation.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// The offending field.
        field: &'static str,
        /// Human-readable reason, naming the offending value.
        message: String,
    },

    /// The relationship type is not known to the registry or the router.
    #[error("Unknown relationship type: '{0}'")]
    UnknownRelationshipType(String),

    /// An equivalent link already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The backing store denied the credential.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Backing-store failure that is not one of the kinds above.
    #[error("Backing store error [{code}]: {message}")]
    Domain {
        /// Machine-readable code (`rate_limited`, `server_error`, ...).
        code: &'static str,
        /// Detail from the backing store. Not shown to end users.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport failure talking to the backing store.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl Error {
    /// Shorthand for an issue that could not be resolved.
    pub fn issue_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "issue",
            id: id.into(),
        }
    }

    /// Shorthand for a link that could not be resolved.
    pub fn link_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "link",
            id: id.into(),
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// The taxonomy bucket this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } | Self::UnknownRelationshipType(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::Domain { .. } => ErrorKind::Domain,
            Self::Config(_) | Self::Io(_) | Self::Json(_) | Self::Transport(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Message safe to show to an end user.
    ///
    /// Validation, conflict and not-found failures describe the offending
    /// value. Everything else collapses to a generic text so backing-store
    /// details do not leak.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::NotFound | ErrorKind::Validation | ErrorKind::Conflict => self.to_string(),
            ErrorKind::Authorization => "The backing store rejected the credentials".to_string(),
            ErrorKind::Domain | ErrorKind::Internal => {
                "The operation failed; see server logs for details".to_string()
            }
        }
    }
}

/// A specialized Result type for meridian operations.
pub type Result<T> = std::result::Result<T, Error>;
