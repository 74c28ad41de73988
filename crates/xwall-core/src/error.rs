use thiserror::Error;

/// Application-wide error types for xwall.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (non-success status or malformed request).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// The search provider answered with an error payload.
    #[error("Search provider error (HTTP {status_code}): {message}")]
    ProviderError { message: String, status_code: u16 },

    /// Provider response could not be interpreted.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A credential set could not be loaded, applied, or saved.
    #[error("Credential error: {0}")]
    CredentialError(String),

    /// Every credential source was tried and none produced a usable set.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Local filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Returns true if the error aborts startup rather than a single cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::ConfigError(_) | AppError::AuthenticationFailed(_)
        )
    }
}
