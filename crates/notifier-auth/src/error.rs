//! Error types for the auth crate.
//!
//! Every fallible operation in this crate surfaces [`AuthError`]. Each
//! variant carries enough context for callers to decide how to handle the
//! failure or to fold it into a tool result message.

/// Unified error type for credential acquisition and persistence.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The access token has expired and cannot be refreshed.
    #[error("token expired for provider {provider}")]
    TokenExpired {
        /// The provider whose token expired.
        provider: String,
    },

    /// No credential has been acquired or persisted for the provider yet.
    #[error("not authenticated with provider {provider}")]
    NotAuthenticated {
        /// The provider that has no stored credential.
        provider: String,
    },

    /// The authorization code exchange or refresh grant was rejected by the
    /// authorization server.
    #[error("invalid grant: {reason}")]
    InvalidGrant {
        /// Explanation from the authorization server.
        reason: String,
    },

    /// An HTTP request to the authorization server failed.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The overall authentication flow failed for a non-specific reason.
    #[error("authentication flow failed: {reason}")]
    FlowFailed {
        /// Details about why the flow failed.
        reason: String,
    },

    /// The local callback server or device-code poll timed out.
    #[error("authorization timed out after {timeout_secs} seconds")]
    Timeout {
        /// How many seconds we waited before giving up.
        timeout_secs: u64,
    },

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (callback TCP listener, token file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
