//! Error types for warden.

use thiserror::Error;

/// Result type alias using warden's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for warden operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown client, inactive client, or bad client secret
    #[error("Invalid client: {0}")]
    InvalidClient(String),

    /// Client is not allowed to use the requested grant type
    #[error("Unauthorized grant type: {0}")]
    UnauthorizedGrantType(String),

    /// Redirect URI is not registered for the client
    #[error("Invalid redirect URI: {0}")]
    InvalidRedirectUri(String),

    /// Authorization code or refresh token is unknown, expired, or consumed
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    /// Redirect URI differs from the one used when the code was issued
    #[error("Redirect URI mismatch: {0}")]
    RedirectMismatch(String),

    /// Requested scope exceeds what the client or grant allows
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Request is missing a parameter or carries a malformed one
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Grant type is not supported by this server
    #[error("Unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// Access token is unknown or expired
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// User authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A conditional update lost a race, or a uniqueness invariant would break
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller may retry the operation once after re-reading state.
    ///
    /// Only a lost race is retryable; every other kind is a persistent fault.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Whether this error reports a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_client() {
        let err = Error::InvalidClient("unknown client".to_string());
        assert_eq!(err.to_string(), "Invalid client: unknown client");
    }

    #[test]
    fn test_error_display_invalid_grant() {
        let err = Error::InvalidGrant("code expired".to_string());
        assert_eq!(err.to_string(), "Invalid grant: code expired");
    }

    #[test]
    fn test_error_display_redirect_mismatch() {
        let err = Error::RedirectMismatch("https://a.example/cb".to_string());
        assert_eq!(
            err.to_string(),
            "Redirect URI mismatch: https://a.example/cb"
        );
    }

    #[test]
    fn test_error_display_conflict() {
        let err = Error::Conflict("code already consumed".to_string());
        assert_eq!(err.to_string(), "Conflict: code already consumed");
    }

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("client c1".to_string());
        assert_eq!(err.to_string(), "Not found: client c1");
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(Error::Conflict("race".into()).is_retryable());
        assert!(!Error::InvalidGrant("x".into()).is_retryable());
        assert!(!Error::NotFound("x".into()).is_retryable());
        assert!(!Error::InvalidClient("x".into()).is_retryable());
        assert!(!Error::Internal("x".into()).is_retryable());
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(!Error::Conflict("x".into()).is_not_found());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
