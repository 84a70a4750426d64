//! # Tanoak DB Patch
//!
//! Change-set semantics for Tanoak DB. A change-set is a key-sorted batch of
//! patch entries, each either a **put** (full record replacement) or a
//! **tombstone** (deletion). Applying a change-set to a sorted record stream
//! is a lazy merge in which change entries win at equal keys; tombstones are
//! resolved out before anything reaches storage.
//!
//! The operations here are pure data transforms over iterators. They carry
//! no I/O and impose no ordering beyond data dependence, which is what lets
//! the tree's bulk update slice and re-slice change-sets freely.

mod error;

pub use error::{PatchError, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::iter::Peekable;
use std::ops::Bound;
use tanoak_db_core::{Fields, Key, Record};

/// A single patch operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PatchOp {
    /// Replace the record for this key entirely
    Put(Fields),
    /// Remove this key
    Tombstone,
}

impl PatchOp {
    /// True for tombstone entries.
    pub fn is_tombstone(&self) -> bool {
        matches!(self, PatchOp::Tombstone)
    }
}

/// A keyed patch entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Record key the operation applies to
    pub key: Key,
    /// The operation
    pub op: PatchOp,
}

impl Change {
    /// A put entry.
    pub fn put(key: Key, fields: Fields) -> Self {
        Self {
            key,
            op: PatchOp::Put(fields),
        }
    }

    /// A tombstone entry.
    pub fn tombstone(key: Key) -> Self {
        Self {
            key,
            op: PatchOp::Tombstone,
        }
    }
}

/// A validated change-set: strictly ascending keys, at most one op per key.
///
/// Callers must coalesce duplicate keys before constructing one.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Build from pre-sorted changes, rejecting unordered or duplicate keys.
    pub fn new(changes: Vec<Change>) -> Result<Self> {
        for pair in changes.windows(2) {
            if pair[0].key >= pair[1].key {
                return Err(PatchError::invalid(format!(
                    "change keys out of order: {} !< {}",
                    pair[0].key, pair[1].key
                )));
            }
        }
        Ok(Self { changes })
    }

    /// The empty change-set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    /// Entries as a slice.
    pub fn as_slice(&self) -> &[Change] {
        &self.changes
    }

    /// Consume into the underlying vector.
    pub fn into_vec(self) -> Vec<Change> {
        self.changes
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Lazily merge a change-set into a sorted record stream.
///
/// The output is the sorted merge of the two streams with change entries
/// winning at equal keys. Tombstones pass through; use
/// [`remove_tombstones`] to resolve them.
pub fn patch_seq<C, R>(changes: C, records: R) -> PatchSeq<C::IntoIter, R::IntoIter>
where
    C: IntoIterator<Item = Change>,
    R: IntoIterator<Item = Record>,
{
    PatchSeq {
        changes: changes.into_iter().peekable(),
        records: records.into_iter().peekable(),
    }
}

/// Iterator returned by [`patch_seq`].
pub struct PatchSeq<C: Iterator<Item = Change>, R: Iterator<Item = Record>> {
    changes: Peekable<C>,
    records: Peekable<R>,
}

impl<C, R> Iterator for PatchSeq<C, R>
where
    C: Iterator<Item = Change>,
    R: Iterator<Item = Record>,
{
    type Item = Change;

    fn next(&mut self) -> Option<Change> {
        match (self.changes.peek(), self.records.peek()) {
            (Some(change), Some(record)) => {
                if change.key <= record.key {
                    // Change wins at equal keys: drop the shadowed record
                    if change.key == record.key {
                        self.records.next();
                    }
                    self.changes.next()
                } else {
                    let record = self.records.next().expect("peeked");
                    Some(Change::put(record.key, record.fields))
                }
            }
            (Some(_), None) => self.changes.next(),
            (None, Some(_)) => {
                let record = self.records.next().expect("peeked");
                Some(Change::put(record.key, record.fields))
            }
            (None, None) => None,
        }
    }
}

/// Drop tombstones from a merged stream, yielding plain records.
pub fn remove_tombstones<I>(entries: I) -> impl Iterator<Item = Record>
where
    I: IntoIterator<Item = Change>,
{
    entries.into_iter().filter_map(|change| match change.op {
        PatchOp::Put(fields) => Some(Record::new(change.key, fields)),
        PatchOp::Tombstone => None,
    })
}

/// Narrowing options for [`filter_changes`].
///
/// `start`/`end` bound the key range (inclusive or exclusive per bound);
/// `fields` projects put maps (tombstones are preserved unchanged).
#[derive(Clone, Debug)]
pub struct ChangeFilter {
    /// Lower key bound
    pub start: Bound<Key>,
    /// Upper key bound
    pub end: Bound<Key>,
    /// Field projection for puts
    pub fields: Option<BTreeSet<String>>,
}

impl Default for ChangeFilter {
    fn default() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
            fields: None,
        }
    }
}

impl ChangeFilter {
    /// Filter to keys at or above `start`.
    pub fn from_key(start: Key) -> Self {
        Self {
            start: Bound::Included(start),
            ..Self::default()
        }
    }

    /// True when `key` falls inside the configured bounds.
    pub fn contains(&self, key: &Key) -> bool {
        let above_start = match &self.start {
            Bound::Unbounded => true,
            Bound::Included(start) => key >= start,
            Bound::Excluded(start) => key > start,
        };
        let below_end = match &self.end {
            Bound::Unbounded => true,
            Bound::Included(end) => key <= end,
            Bound::Excluded(end) => key < end,
        };
        above_start && below_end
    }
}

/// Narrow a change stream by key range and field projection.
pub fn filter_changes<I>(changes: I, filter: ChangeFilter) -> impl Iterator<Item = Change>
where
    I: IntoIterator<Item = Change>,
{
    let fields = filter.fields.clone();
    changes
        .into_iter()
        .filter(move |change| filter.contains(&change.key))
        .map(move |change| match (&fields, change.op) {
            (Some(fields), PatchOp::Put(map)) => {
                let projected: Fields = map
                    .into_iter()
                    .filter(|(name, _)| fields.contains(name.as_str()))
                    .collect();
                Change::put(change.key, projected)
            }
            (_, op) => Change { key: change.key, op },
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(b: &[u8]) -> Key {
        Key::from_slice(b).unwrap()
    }

    fn fields(name: &str, v: i64) -> Fields {
        let mut map = Fields::new();
        map.insert(name.to_string(), json!(v));
        map
    }

    fn record(b: &[u8], v: i64) -> Record {
        Record::new(key(b), fields("v", v))
    }

    fn apply(changes: &ChangeSet, records: Vec<Record>) -> Vec<Record> {
        remove_tombstones(patch_seq(changes.clone(), records)).collect()
    }

    #[test]
    fn test_change_set_rejects_unordered() {
        let unordered = vec![
            Change::put(key(&[2]), Fields::new()),
            Change::put(key(&[1]), Fields::new()),
        ];
        assert!(ChangeSet::new(unordered).is_err());

        let duplicate = vec![
            Change::put(key(&[1]), Fields::new()),
            Change::tombstone(key(&[1])),
        ];
        assert!(ChangeSet::new(duplicate).is_err());
    }

    #[test]
    fn test_empty_changes_is_identity() {
        let records = vec![record(&[1], 10), record(&[2], 20)];
        let merged = apply(&ChangeSet::empty(), records.clone());
        assert_eq!(merged, records);
    }

    #[test]
    fn test_empty_records_yields_puts() {
        let changes = ChangeSet::new(vec![
            Change::put(key(&[1]), fields("v", 1)),
            Change::tombstone(key(&[2])),
            Change::put(key(&[3]), fields("v", 3)),
        ])
        .unwrap();
        let merged = apply(&changes, Vec::new());
        assert_eq!(merged, vec![record(&[1], 1), record(&[3], 3)]);
    }

    #[test]
    fn test_put_replaces_record_entirely() {
        let changes = ChangeSet::new(vec![Change::put(key(&[2]), fields("w", 9))]).unwrap();
        let merged = apply(&changes, vec![record(&[1], 1), record(&[2], 2)]);
        assert_eq!(merged.len(), 2);
        // Full replacement, not field merge: the old "v" field is gone
        assert_eq!(merged[1].fields, fields("w", 9));
    }

    #[test]
    fn test_tombstone_removes_and_insert_interleaves() {
        let changes = ChangeSet::new(vec![
            Change::tombstone(key(&[1])),
            Change::put(key(&[2]), fields("v", 22)),
            Change::tombstone(key(&[9])),
        ])
        .unwrap();
        let merged = apply(&changes, vec![record(&[1], 1), record(&[3], 3)]);
        assert_eq!(merged, vec![record(&[2], 22), record(&[3], 3)]);
    }

    #[test]
    fn test_output_is_sorted_and_tombstone_free() {
        let changes = ChangeSet::new(vec![
            Change::put(key(&[0]), fields("v", 0)),
            Change::tombstone(key(&[2])),
            Change::put(key(&[5]), fields("v", 5)),
        ])
        .unwrap();
        let records = vec![record(&[1], 1), record(&[2], 2), record(&[4], 4)];
        let merged = apply(&changes, records);

        for pair in merged.windows(2) {
            assert!(pair[0].key < pair[1].key);
        }
        assert!(merged.iter().all(|r| r.key != key(&[2])));
    }

    #[test]
    fn test_applying_twice_is_idempotent() {
        let changes = ChangeSet::new(vec![
            Change::put(key(&[1]), fields("v", 11)),
            Change::tombstone(key(&[3])),
        ])
        .unwrap();
        let records = vec![record(&[1], 1), record(&[2], 2), record(&[3], 3)];

        let once = apply(&changes, records);
        let twice = apply(&changes, once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_changes_bounds() {
        let changes = vec![
            Change::put(key(&[1]), fields("v", 1)),
            Change::put(key(&[2]), fields("v", 2)),
            Change::tombstone(key(&[3])),
            Change::put(key(&[4]), fields("v", 4)),
        ];
        let filter = ChangeFilter {
            start: Bound::Excluded(key(&[1])),
            end: Bound::Included(key(&[3])),
            fields: None,
        };
        let kept: Vec<Change> = filter_changes(changes, filter).collect();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].key, key(&[2]));
        assert!(kept[1].op.is_tombstone());
    }

    #[test]
    fn test_filter_changes_projects_puts_only() {
        let mut both = fields("v", 1);
        both.insert("w".to_string(), json!(2));
        let changes = vec![
            Change::put(key(&[1]), both),
            Change::tombstone(key(&[2])),
        ];
        let filter = ChangeFilter {
            fields: Some(["w".to_string()].into()),
            ..ChangeFilter::default()
        };
        let kept: Vec<Change> = filter_changes(changes, filter).collect();

        match &kept[0].op {
            PatchOp::Put(map) => {
                assert_eq!(map.len(), 1);
                assert!(map.contains_key("w"));
            }
            other => panic!("expected put, got {:?}", other),
        }
        // Tombstones are preserved unchanged
        assert!(kept[1].op.is_tombstone());
    }
}
