//! Error types for tanoak-db-patch

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, PatchError>;

/// Patch error type
#[derive(Error, Debug)]
pub enum PatchError {
    /// Malformed change-set: unordered keys, duplicate keys
    #[error("Invalid change-set: {0}")]
    InvalidChangeSet(String),

    /// Error from the core layer
    #[error(transparent)]
    Core(#[from] tanoak_db_core::Error),
}

impl PatchError {
    /// Create an invalid-change-set error
    pub fn invalid(msg: impl Into<String>) -> Self {
        PatchError::InvalidChangeSet(msg.into())
    }
}
