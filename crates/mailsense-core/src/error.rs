//! Error types for Mailsense

use thiserror::Error;

/// Result type alias using Mailsense's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Mailsense
#[derive(Error, Debug)]
pub enum Error {
    // Authentication errors
    #[error("Authentication required: no usable credential is present")]
    AuthenticationRequired,

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Token refresh failed: {reason}")]
    TokenRefreshFailed { reason: String },

    #[error("Credential storage error: {0}")]
    Credential(String),

    // Upstream provider errors
    #[error("Mailbox provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Classification unavailable: {0}")]
    ClassificationUnavailable(String),

    // Caller errors
    #[error("Invalid request: {0}")]
    Validation(String),

    // Batch control
    #[error("Operation cancelled")]
    Cancelled,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Returns true if this error indicates the user needs to re-authenticate
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Error::AuthenticationRequired | Error::TokenRefreshFailed { .. }
        )
    }

    /// Returns true for failures worth retrying: throttling, server-side
    /// errors, and transport-level problems such as timeouts
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Provider { status, .. } => *status == 429 || *status >= 500,
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}
