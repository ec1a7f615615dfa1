use thiserror::Error;

/// Errors that can occur when interacting with the secret store.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    /// The requested secret does not exist.
    #[error("Secret not found: {0}")]
    NotFound(String),

    /// The backing store failed.
    #[error("Secret store backend error: {0}")]
    Backend(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for secret store operations.
pub type Result<T> = std::result::Result<T, SecretStoreError>;
