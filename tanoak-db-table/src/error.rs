//! Error types for tanoak-db-table

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, TableError>;

/// Table error type
#[derive(Error, Debug)]
pub enum TableError {
    /// The table has staged changes that must be flushed first
    #[error("Table '{0}' has staged changes; flush before committing")]
    Dirty(String),

    /// Error from the storage core
    #[error(transparent)]
    Core(#[from] tanoak_db_core::Error),

    /// Error from the patch layer
    #[error(transparent)]
    Patch(#[from] tanoak_db_patch::PatchError),

    /// Error from the root tracker
    #[error(transparent)]
    Refs(#[from] tanoak_db_refs::RefsError),
}
