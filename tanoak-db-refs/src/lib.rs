//! # Tanoak DB Refs
//!
//! Root-reference tracking: the one mutable corner of the system. A tracker
//! maps table names to their current root digest, keeps an append-only
//! history of advances, and advances roots with compare-and-set so a single
//! writer per table is enforced at the commit point.
//!
//! The storage core treats trackers as opaque; [`MemoryRootTracker`] is the
//! built-in implementation for tests and embedded use.

mod error;

pub use error::{RefsError, Result};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// One entry in a table's root history.
///
/// `digest` is `None` for an empty tree (nil root).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootRecord {
    /// Table name
    pub table: String,
    /// Root node digest, or None for an empty tree
    pub digest: Option<String>,
    /// Monotonic advance sequence number, starting at 0
    pub seq: u64,
    /// RFC 3339 timestamp of the advance
    pub updated_at: String,
}

/// Mutable tracker of named table roots.
///
/// Advancing is compare-and-set on the current digest; history is
/// append-only.
#[async_trait]
pub trait RootTracker: Debug + Send + Sync {
    /// Current root record for a table, or `None` if never advanced.
    async fn resolve(&self, table: &str) -> Result<Option<RootRecord>>;

    /// Advance a table's root.
    ///
    /// `expected` must match the current digest (`None` for a table with no
    /// history or a nil root); otherwise fails with
    /// [`RefsError::Conflict`] and no change is made.
    async fn advance(
        &self,
        table: &str,
        expected: Option<&str>,
        next: Option<String>,
    ) -> Result<RootRecord>;

    /// Full advance history for a table, oldest first.
    async fn history(&self, table: &str) -> Result<Vec<RootRecord>>;

    /// Names of all tracked tables, sorted.
    async fn tables(&self) -> Result<Vec<String>>;
}

/// In-memory [`RootTracker`].
#[derive(Debug, Default)]
pub struct MemoryRootTracker {
    records: RwLock<HashMap<String, Vec<RootRecord>>>,
}

impl MemoryRootTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RootTracker for MemoryRootTracker {
    async fn resolve(&self, table: &str) -> Result<Option<RootRecord>> {
        Ok(self
            .records
            .read()
            .get(table)
            .and_then(|history| history.last().cloned()))
    }

    async fn advance(
        &self,
        table: &str,
        expected: Option<&str>,
        next: Option<String>,
    ) -> Result<RootRecord> {
        let mut records = self.records.write();
        let history = records.entry(table.to_string()).or_default();

        let current = history.last().and_then(|r| r.digest.as_deref());
        if current != expected {
            return Err(RefsError::Conflict {
                table: table.to_string(),
                expected: expected.map(String::from),
                current: current.map(String::from),
            });
        }

        let record = RootRecord {
            table: table.to_string(),
            digest: next,
            seq: history.len() as u64,
            updated_at: Utc::now().to_rfc3339(),
        };
        history.push(record.clone());
        Ok(record)
    }

    async fn history(&self, table: &str) -> Result<Vec<RootRecord>> {
        Ok(self.records.read().get(table).cloned().unwrap_or_default())
    }

    async fn tables(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.records.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
