//! # Tanoak DB Table
//!
//! The table layer binds a data-tree root and a patch buffer into an
//! immutable table snapshot. Reads overlay the buffer on the tree, so staged
//! changes are visible before any node is written; [`Table::flush`] runs the
//! tree's bulk update and yields a snapshot with an empty buffer;
//! [`Table::commit`] advances the table's named root through the reference
//! tracker with compare-and-set.
//!
//! Snapshots are values: every operation returns a new `Table`, and a
//! snapshot stays readable (against fully immutable nodes) no matter what
//! later snapshots do.

mod error;

pub use error::{Result, TableError};

use std::collections::BTreeSet;
use std::sync::Arc;
use tanoak_db_core::{
    coder_for, ChildRef, Error, Key, Node, NodeRef, NodeStore, Record, TreeParams, Value,
};
use tanoak_db_index::update::{update_root, UpdateStats};
use tanoak_db_index::{Scan, ScanRange};
use tanoak_db_patch::{filter_changes, Change, ChangeFilter, ChangeSet, PatchOp};
use tanoak_db_refs::RootTracker;

/// An immutable table snapshot: tree root plus staged patch buffer.
#[derive(Clone, Debug)]
pub struct Table<S> {
    store: Arc<S>,
    name: String,
    params: TreeParams,
    root: Option<ChildRef>,
    /// Root digest this snapshot was opened from (or last committed), used
    /// as the compare-and-set expectation
    committed: Option<String>,
    /// Staged changes, key-sorted and coalesced (latest op per key wins)
    pending: Vec<Change>,
}

impl<S: NodeStore> Table<S> {
    /// Open a table snapshot at its current tracked root.
    ///
    /// A table the tracker has never seen (or whose current root is nil)
    /// opens empty.
    pub async fn open(
        store: Arc<S>,
        tracker: &dyn RootTracker,
        name: impl Into<String>,
        params: TreeParams,
    ) -> Result<Self> {
        params.validate()?;
        let name = name.into();
        let committed = tracker
            .resolve(&name)
            .await?
            .and_then(|record| record.digest);
        let root = match &committed {
            Some(digest) => Some(load_root(store.as_ref(), digest).await?),
            None => None,
        };
        Ok(Self {
            store,
            name,
            params,
            root,
            committed,
            pending: Vec::new(),
        })
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tree parameters this table was opened with.
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Digest of the current tree root, `None` for an empty tree.
    pub fn root_digest(&self) -> Option<&str> {
        self.root.as_ref().map(|r| r.link.digest.as_str())
    }

    /// Records in the tree (staged changes not included).
    pub fn count(&self) -> u64 {
        self.root.as_ref().map(|r| r.count).unwrap_or(0)
    }

    /// True when changes are staged but not yet flushed.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Encode a typed value into a key with this table's key lexicoder.
    pub fn encode_key(&self, value: &Value) -> Result<Key> {
        let coder = coder_for(&self.params.key_coder);
        Ok(Key::new(coder.encode(value)?)?)
    }

    /// Stage a change-set into the patch buffer without writing any nodes.
    ///
    /// Staged changes overlay reads immediately; per key, the newest staged
    /// op wins.
    pub fn stage(mut self, changes: ChangeSet) -> Self {
        self.pending = coalesce(std::mem::take(&mut self.pending), changes.into_vec());
        self
    }

    /// Apply the patch buffer through the tree's bulk update.
    ///
    /// Returns the flushed snapshot (empty buffer, new root) and update
    /// statistics. The prior root remains readable.
    pub async fn flush(mut self) -> Result<(Self, UpdateStats)> {
        let changes = ChangeSet::new(std::mem::take(&mut self.pending))?;
        let result = update_root(self.store.as_ref(), &self.params, self.root.as_ref(), &changes)
            .await?;
        tracing::debug!(
            table = %self.name,
            changes = changes.len(),
            new_count = result.root.as_ref().map(|r| r.count).unwrap_or(0),
            "table flushed"
        );
        self.root = result.root;
        Ok((self, result.stats))
    }

    /// Stage and flush a change-set in one step, yielding the new snapshot.
    pub async fn update(self, changes: ChangeSet) -> Result<(Self, UpdateStats)> {
        self.stage(changes).flush().await
    }

    /// Advance the table's tracked root to this snapshot's root.
    ///
    /// Compare-and-set against the root this snapshot was opened from;
    /// a concurrent advance surfaces as a conflict and nothing changes.
    /// Requires a flushed snapshot.
    pub async fn commit(mut self, tracker: &dyn RootTracker) -> Result<Self> {
        if self.is_dirty() {
            return Err(TableError::Dirty(self.name.clone()));
        }
        let next = self.root_digest().map(String::from);
        let record = tracker
            .advance(&self.name, self.committed.as_deref(), next)
            .await?;
        tracing::info!(
            table = %self.name,
            seq = record.seq,
            root = record.digest.as_deref().unwrap_or("nil"),
            "table root advanced"
        );
        self.committed = record.digest;
        Ok(self)
    }

    /// Read the requested keys, overlaying staged changes on the tree.
    ///
    /// Returns matching records in ascending key order; `fields` projects
    /// the result.
    pub async fn get(&self, keys: &[Key], fields: Option<&BTreeSet<String>>) -> Result<Vec<Record>> {
        let from_tree =
            tanoak_db_index::read_batch(self.store.as_ref(), self.root.as_ref(), keys, fields)
                .await?;

        let requested: BTreeSet<Key> = keys.iter().cloned().collect();
        let overlay: Vec<Change> = filter_changes(
            self.pending.iter().cloned(),
            ChangeFilter {
                fields: fields.cloned(),
                ..ChangeFilter::default()
            },
        )
        .filter(|change| requested.contains(&change.key))
        .collect();

        Ok(tanoak_db_patch::remove_tombstones(tanoak_db_patch::patch_seq(overlay, from_tree))
            .collect())
    }

    /// Scan a key range lazily, overlaying staged changes on the tree.
    pub fn scan(
        &self,
        range: ScanRange,
        fields: Option<&BTreeSet<String>>,
    ) -> TableScan<'_, S> {
        let filter = ChangeFilter {
            start: range.start.clone(),
            end: range.end.clone(),
            fields: fields.cloned(),
        };
        let overlay: Vec<Change> =
            filter_changes(self.pending.iter().cloned(), filter).collect();

        TableScan {
            tree: Scan::new(self.store.as_ref(), self.root.as_ref(), range, fields.cloned()),
            overlay: overlay.into_iter(),
            pending_next: None,
            tree_next: None,
        }
    }
}

/// Load a root digest and derive its child reference.
async fn load_root<S: NodeStore>(store: &S, digest: &str) -> Result<ChildRef> {
    match store.get(digest).await? {
        Node::Partition(partition) => Ok(ChildRef {
            link: NodeRef::link("partition", digest, None),
            height: 0,
            count: partition.count,
            first_key: partition.first_key,
        }),
        Node::Index(index) => Ok(ChildRef {
            link: NodeRef::link("index", digest, None),
            height: index.height,
            count: index.count,
            first_key: index.children[0].first_key.clone(),
        }),
        other => Err(Error::TypeMismatch {
            digest: digest.to_string(),
            expected: "partition",
            actual: other.data_type(),
        }
        .into()),
    }
}

/// Merge staged changes with a newer batch; the newer op wins per key.
fn coalesce(existing: Vec<Change>, newer: Vec<Change>) -> Vec<Change> {
    let mut merged = Vec::with_capacity(existing.len() + newer.len());
    let mut old = existing.into_iter().peekable();
    let mut new = newer.into_iter().peekable();
    loop {
        match (old.peek(), new.peek()) {
            (Some(o), Some(n)) => {
                if o.key < n.key {
                    merged.push(old.next().expect("peeked"));
                } else {
                    if o.key == n.key {
                        old.next();
                    }
                    merged.push(new.next().expect("peeked"));
                }
            }
            (Some(_), None) => merged.push(old.next().expect("peeked")),
            (None, Some(_)) => merged.push(new.next().expect("peeked")),
            (None, None) => break,
        }
    }
    merged
}

/// Lazy merged cursor over the tree and the staged patch buffer.
///
/// Staged entries win at equal keys; staged tombstones suppress tree
/// records.
pub struct TableScan<'a, S> {
    tree: Scan<'a, S>,
    overlay: std::vec::IntoIter<Change>,
    pending_next: Option<Change>,
    tree_next: Option<Record>,
}

impl<'a, S: tanoak_db_core::NodeRead> TableScan<'a, S> {
    /// The next visible record in key order.
    pub async fn next(&mut self) -> Result<Option<Record>> {
        loop {
            if self.pending_next.is_none() {
                self.pending_next = self.overlay.next();
            }
            if self.tree_next.is_none() {
                self.tree_next = self.tree.next().await?;
            }

            let staged_first = match (&self.pending_next, &self.tree_next) {
                (None, None) => return Ok(None),
                (None, Some(_)) => false,
                (Some(_), None) => true,
                (Some(change), Some(record)) => change.key <= record.key,
            };
            if !staged_first {
                return Ok(self.tree_next.take());
            }

            // Staged entry wins; drop any shadowed tree record
            let change = self.pending_next.take().expect("staged entry present");
            if let Some(record) = &self.tree_next {
                if record.key == change.key {
                    self.tree_next = None;
                }
            }
            match change.op {
                PatchOp::Put(fields) => return Ok(Some(Record::new(change.key, fields))),
                PatchOp::Tombstone => continue,
            }
        }
    }

    /// Drain the remaining records into a vector.
    pub async fn collect(mut self) -> Result<Vec<Record>> {
        let mut out = Vec::new();
        while let Some(record) = self.next().await? {
            out.push(record);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> Key {
        Key::from_slice(&[b]).unwrap()
    }

    fn put(b: u8) -> Change {
        Change::put(key(b), tanoak_db_core::Fields::new())
    }

    #[test]
    fn test_coalesce_newest_wins() {
        let existing = vec![put(1), Change::tombstone(key(3)), put(5)];
        let newer = vec![put(3), Change::tombstone(key(5)), put(7)];
        let merged = coalesce(existing, newer);

        let keys: Vec<Key> = merged.iter().map(|c| c.key.clone()).collect();
        assert_eq!(keys, vec![key(1), key(3), key(5), key(7)]);
        assert!(!merged[1].op.is_tombstone(), "newer put replaces tombstone");
        assert!(merged[2].op.is_tombstone(), "newer tombstone replaces put");
    }
}
