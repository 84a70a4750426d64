//! Error types for tanoak-db-refs

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, RefsError>;

/// Root-tracker error type
#[derive(Error, Debug)]
pub enum RefsError {
    /// Compare-and-set failed: the current root did not match the expected
    /// value
    #[error("Conflict advancing '{table}': expected {expected:?}, current {current:?}")]
    Conflict {
        /// Table whose root was being advanced
        table: String,
        /// Root digest the caller expected
        expected: Option<String>,
        /// Root digest actually current
        current: Option<String>,
    },

    /// Backend failure
    #[error("Tracker error: {0}")]
    Backend(String),
}

impl RefsError {
    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        RefsError::Backend(msg.into())
    }
}
