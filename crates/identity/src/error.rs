//! Error types for identity operations

/// Errors from identity storage and token refresh.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("store parse error: {0}")]
    StoreParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for identity operations.
pub type Result<T> = std::result::Result<T, Error>;
