//! Error types for tanoak-db-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
///
/// Covers the error kinds the storage core must distinguish. Invariant
/// violations carry the offending node digest so callers can report which
/// stored node failed.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed caller input: non-key bytes, wrong tuple arity, empty input
    /// to a coder that forbids it, unordered records, and the like
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Partition construction was given more records than the partition limit
    #[error("Partition overflow: {count} records exceeds limit {limit}")]
    PartitionOverflow {
        /// Number of records supplied
        count: usize,
        /// Configured partition limit
        limit: usize,
    },

    /// A referenced digest is absent from the node store
    #[error("Missing node: {0}")]
    MissingNode(String),

    /// A loaded node had an unexpected data type tag
    #[error("Type mismatch for node {digest}: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Digest of the offending node
        digest: String,
        /// The data type the caller required
        expected: &'static str,
        /// The data type actually stored
        actual: &'static str,
    },

    /// A loaded node failed a structural invariant
    #[error("Corrupt node {digest}: {detail}")]
    CorruptNode {
        /// Digest of the offending node
        digest: String,
        /// Which attribute or invariant failed
        detail: String,
    },

    /// Unknown lexicoder tag, wrong parameter count, or invalid tree parameters
    #[error("Unsupported config: {0}")]
    UnsupportedConfig(String),

    /// Storage-related errors from the node store backend
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a missing-node error
    pub fn missing_node(digest: impl Into<String>) -> Self {
        Error::MissingNode(digest.into())
    }

    /// Create a corrupt-node error
    pub fn corrupt_node(digest: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::CorruptNode {
            digest: digest.into(),
            detail: detail.into(),
        }
    }

    /// Create an unsupported-config error
    pub fn unsupported_config(msg: impl Into<String>) -> Self {
        Error::UnsupportedConfig(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Create an I/O error
    pub fn io(msg: impl Into<String>) -> Self {
        Error::Io(msg.into())
    }
}
