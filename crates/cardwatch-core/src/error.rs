//! Error types for the cardwatch system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for cardwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the cardwatch system
#[derive(Error, Debug)]
pub enum Error {
    /// Board source errors (card or list fetch)
    #[error("Board source error: {0}")]
    BoardSource(String),

    /// Notifier errors (message delivery)
    #[error("Notifier error: {0}")]
    Notifier(String),

    /// Snapshot store I/O errors
    #[error("Snapshot store error: {0}")]
    SnapshotStore(String),

    /// Persisted snapshot exists but cannot be parsed
    #[error("Snapshot corrupted: {0}")]
    SnapshotCorrupt(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from board or messaging APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a board source error
    pub fn board(msg: impl Into<String>) -> Self {
        Self::BoardSource(msg.into())
    }

    /// Create a notifier error
    pub fn notifier(msg: impl Into<String>) -> Self {
        Self::Notifier(msg.into())
    }

    /// Create a snapshot store error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::SnapshotStore(msg.into())
    }

    /// Create a snapshot corruption error
    pub fn snapshot_corrupt(msg: impl Into<String>) -> Self {
        Self::SnapshotCorrupt(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the persisted snapshot could not be parsed
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::SnapshotCorrupt(_))
    }
}
