//! Error types for `OAuth2` operations.

use std::io;

use crate::token::GrantType;

/// Result type alias for `OAuth2` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for token store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// `OAuth2` error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation is not available for the configured grant type.
    #[error("{operation} is not available for the {grant} grant")]
    UnsupportedGrantType {
        /// Operation that was attempted.
        operation: &'static str,
        /// Grant type the manager is configured with.
        grant: GrantType,
    },

    /// The `state` returned on the redirect does not match the issued one.
    #[error("OAuth state mismatch")]
    StateMismatch,

    /// The pending authorization request is too old to be redeemed.
    #[error("Authorization request expired")]
    AuthorizationExpired,

    /// Token endpoint refused or failed the request.
    #[error("Token acquisition failed: {error} - {description}")]
    TokenAcquisitionFailed {
        /// Error code (e.g., `invalid_grant`).
        error: String,
        /// Human-readable description.
        description: String,
    },

    /// No usable credential; the user must authorize interactively again.
    #[error("Interactive authorization required")]
    AuthRequired,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Token store error.
    #[error("Token store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// Creates a token acquisition error from error code and description.
    #[must_use]
    pub fn acquisition(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::TokenAcquisitionFailed {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Wraps a transport-level failure talking to the token endpoint.
    #[must_use]
    pub fn transport(err: &reqwest::Error) -> Self {
        Self::acquisition("transport_error", err.to_string())
    }

    /// True for failures that say nothing about the grant itself: transport
    /// errors, 5xx responses and unreadable success bodies.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TokenAcquisitionFailed { error, .. } => {
                matches!(
                    error.as_str(),
                    "transport_error"
                        | "invalid_response"
                        | "server_error"
                        | "temporarily_unavailable"
                ) || error.starts_with("http_5")
            }
            _ => false,
        }
    }
}

/// Errors raised by [`TokenStore`](crate::store::TokenStore) backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::acquisition("transport_error", "timed out").is_transient());
        assert!(Error::acquisition("http_503", "<html>").is_transient());
        assert!(Error::acquisition("temporarily_unavailable", "").is_transient());

        assert!(!Error::acquisition("invalid_grant", "AADSTS70008").is_transient());
        assert!(!Error::acquisition("http_400", "bad").is_transient());
        assert!(!Error::AuthRequired.is_transient());
    }
}
