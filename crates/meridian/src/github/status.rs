//! Backing-store failure classification.
//!
//! HTTP status codes are turned into [`ApiStatus`] once, at the client, and
//! every caller maps [`ApiError`] into the domain taxonomy through the single
//! exhaustive table in [`ApiError::into_domain`]. Whether a 404 means "the
//! entity is missing" or "the feature is not enabled on this repository" is
//! decided by the caller through [`NotFoundMeans`].

use crate::error::Error;
use thiserror::Error as ThisError;

/// Status classes the backing store can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    /// 404
    NotFound,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 409
    Conflict,
    /// 422
    Unprocessable,
    /// 429
    RateLimited,
    /// 5xx
    Server(u16),
    /// Anything else outside 2xx
    Unexpected(u16),
}

impl ApiStatus {
    /// Classify a non-success HTTP status code.
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        match code {
            404 => Self::NotFound,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            409 => Self::Conflict,
            422 => Self::Unprocessable,
            429 => Self::RateLimited,
            500..=599 => Self::Server(code),
            other => Self::Unexpected(other),
        }
    }
}

/// What a not-found response means at a given call site.
#[derive(Debug, Clone)]
pub enum NotFoundMeans {
    /// The addressed entity does not exist.
    Entity {
        /// Entity type for the error message.
        entity: &'static str,
        /// Identifier for the error message.
        id: String,
    },

    /// The feature-gated endpoint is not enabled for this repository.
    FeatureDisabled(&'static str),
}

impl NotFoundMeans {
    /// A missing issue, by local number.
    #[must_use]
    pub fn issue(number: u64) -> Self {
        Self::Entity {
            entity: "issue",
            id: format!("#{number}"),
        }
    }
}

/// 422 wordings GitHub uses when the relationship being added exists.
const DUPLICATE_WORDINGS: [&str; 4] = [
    "already exists",
    "already been added",
    "already a sub-issue",
    "duplicate",
];

/// A failed backing-store call.
#[derive(Debug, ThisError)]
pub enum ApiError {
    /// The store answered with a non-success status.
    #[error("{status:?}: {message}")]
    Status {
        /// Classified status.
        status: ApiStatus,
        /// The store's message.
        message: String,
    },

    /// The request never produced a response.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Build a status error.
    pub fn status(status: ApiStatus, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Whether the store answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Status {
                status: ApiStatus::NotFound,
                ..
            }
        )
    }

    /// Whether the store rejected the call because the relationship exists.
    ///
    /// GitHub answers 409 for some duplicate relationships and 422 with an
    /// explanatory message for others. Other 422s that merely mention
    /// "already" (an issue that already has a different parent) are not
    /// duplicates.
    #[must_use]
    pub fn is_duplicate_relationship(&self) -> bool {
        match self {
            Self::Status {
                status: ApiStatus::Conflict,
                ..
            } => true,
            Self::Status {
                status: ApiStatus::Unprocessable,
                message,
            } => {
                let message = message.to_ascii_lowercase();
                DUPLICATE_WORDINGS
                    .iter()
                    .any(|wording| message.contains(wording))
            }
            _ => false,
        }
    }

    /// Translate into the domain error taxonomy.
    #[must_use]
    pub fn into_domain(self, not_found: NotFoundMeans) -> Error {
        match self {
            Self::Status { status, message } => match status {
                ApiStatus::NotFound => match not_found {
                    NotFoundMeans::Entity { entity, id } => Error::NotFound { entity, id },
                    NotFoundMeans::FeatureDisabled(feature) => Error::Domain {
                        code: "feature_disabled",
                        message: format!("{feature} is not enabled: {message}"),
                    },
                },
                ApiStatus::Unauthorized | ApiStatus::Forbidden => Error::Authorization(message),
                ApiStatus::Conflict => Error::Conflict(message),
                ApiStatus::Unprocessable => Error::Validation {
                    field: "request",
                    message,
                },
                ApiStatus::RateLimited => Error::Domain {
                    code: "rate_limited",
                    message,
                },
                ApiStatus::Server(code) => Error::Domain {
                    code: "server_error",
                    message: format!("{code}: {message}"),
                },
                ApiStatus::Unexpected(code) => Error::Domain {
                    code: "unexpected_status",
                    message: format!("{code}: {message}"),
                },
            },
            Self::Transport(e) => Error::Transport(e),
            Self::Decode(e) => Error::Json(e),
        }
    }
}

/// Result type for backing-store calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::rstest;

    #[rstest]
    #[case(404, ApiStatus::NotFound)]
    #[case(401, ApiStatus::Unauthorized)]
    #[case(403, ApiStatus::Forbidden)]
    #[case(409, ApiStatus::Conflict)]
    #[case(422, ApiStatus::Unprocessable)]
    #[case(429, ApiStatus::RateLimited)]
    #[case(502, ApiStatus::Server(502))]
    #[case(418, ApiStatus::Unexpected(418))]
    fn test_from_code(#[case] code: u16, #[case] expected: ApiStatus) {
        assert_eq!(ApiStatus::from_code(code), expected);
    }

    #[rstest]
    #[case(ApiStatus::Unauthorized, ErrorKind::Authorization)]
    #[case(ApiStatus::Forbidden, ErrorKind::Authorization)]
    #[case(ApiStatus::Conflict, ErrorKind::Conflict)]
    #[case(ApiStatus::Unprocessable, ErrorKind::Validation)]
    #[case(ApiStatus::RateLimited, ErrorKind::Domain)]
    #[case(ApiStatus::Server(503), ErrorKind::Domain)]
    #[case(ApiStatus::Unexpected(418), ErrorKind::Domain)]
    fn test_into_domain_kinds(#[case] status: ApiStatus, #[case] kind: ErrorKind) {
        let err = ApiError::status(status, "boom").into_domain(NotFoundMeans::issue(1));
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn test_not_found_disambiguation() {
        let entity = ApiError::status(ApiStatus::NotFound, "Not Found")
            .into_domain(NotFoundMeans::issue(42));
        assert!(matches!(entity, Error::NotFound { entity: "issue", ref id } if id == "#42"));

        let feature = ApiError::status(ApiStatus::NotFound, "Not Found")
            .into_domain(NotFoundMeans::FeatureDisabled("sub-issues"));
        assert!(matches!(feature, Error::Domain { code: "feature_disabled", .. }));
    }

    #[rstest]
    #[case(ApiStatus::Conflict, "anything", true)]
    #[case(ApiStatus::Unprocessable, "Relationship already exists", true)]
    #[case(ApiStatus::Unprocessable, "Duplicate sub-issue", true)]
    #[case(ApiStatus::Unprocessable, "Issue may not contain duplicate sub-issues", true)]
    #[case(ApiStatus::Unprocessable, "Validation Failed", false)]
    #[case(ApiStatus::Unprocessable, "Issue already has a parent", false)]
    #[case(ApiStatus::Unprocessable, "Issue may only have one parent", false)]
    #[case(ApiStatus::NotFound, "already", false)]
    fn test_is_duplicate_relationship(
        #[case] status: ApiStatus,
        #[case] message: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            ApiError::status(status, message).is_duplicate_relationship(),
            expected
        );
    }
}
