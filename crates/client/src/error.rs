//! Error types for the Stash client core.

use thiserror::Error;

/// Client error type covering all failure modes of the session and
/// authorization layer.
#[derive(Debug, Error)]
pub enum ApiError {
    // Authorization errors
    /// The operation was denied locally by the authorization gate.
    /// No network call was made.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The access token has expired. Recoverable: the refresh
    /// coordinator absorbs this and retries with a fresh token.
    #[error("access token expired")]
    AuthExpired,

    /// The credentials were rejected outright or the refresh exchange
    /// failed. Terminal: the session has been cleared.
    #[error("authentication invalid: {0}")]
    AuthInvalid(String),

    // Request errors
    /// The server rejected the request as malformed (HTTP 400/422).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The server answered with an unexpected non-success status.
    #[error("server error: status {status}: {detail}")]
    Server {
        /// HTTP status code returned by the server.
        status: u16,
        /// Error detail from the response body, if any.
        detail: String,
    },

    // Infrastructure errors
    /// Transport-level failure: connection error, TLS failure or
    /// timeout. Never retried by this layer.
    #[error("network failure: {0}")]
    Network(String),

    /// The persisted session state could not be written.
    #[error("session storage failed: {0}")]
    Storage(String),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Whether this error identifies an expired access token that the
    /// refresh coordinator may recover from.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::AuthExpired)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}
