//! Tablet construction and reads
//!
//! A tablet is pure data: an ordered vector of (key, partial field map)
//! entries for exactly one family within exactly one partition. Tombstones
//! are resolved before anything reaches a tablet, and only the `base` family
//! keeps entries with empty field maps (presence markers).

use std::collections::BTreeSet;
use tanoak_db_core::record::assert_ascending;
use tanoak_db_core::{Key, Record, Result, TabletNode};

/// Build a tablet from entries already projected to the family's fields.
///
/// Keys must be strictly ascending.
pub fn from_records(entries: Vec<Record>) -> Result<TabletNode> {
    assert_ascending(&entries)?;
    Ok(TabletNode { entries })
}

/// Remove entries whose partial field map is empty.
///
/// Not applied to the `base` family, which preserves empty maps as presence
/// markers.
pub fn prune(tablet: TabletNode) -> TabletNode {
    TabletNode {
        entries: tablet
            .entries
            .into_iter()
            .filter(|entry| !entry.fields.is_empty())
            .collect(),
    }
}

/// All entries in key order.
pub fn read_all(tablet: &TabletNode) -> impl Iterator<Item = &Record> {
    tablet.entries.iter()
}

/// Entries for the requested keys, in ascending key order.
///
/// Caller-provided key order is irrelevant; only present keys are returned.
pub fn read_batch<'a>(
    tablet: &'a TabletNode,
    keys: &'a BTreeSet<Key>,
) -> impl Iterator<Item = &'a Record> {
    tablet.entries.iter().filter(|entry| keys.contains(&entry.key))
}

/// Entries within `[min, max]` (inclusive bounds, `None` = unbounded).
pub fn read_range<'a>(
    tablet: &'a TabletNode,
    min: Option<&Key>,
    max: Option<&Key>,
) -> &'a [Record] {
    let start = match min {
        Some(min) => tablet.entries.partition_point(|e| &e.key < min),
        None => 0,
    };
    let end = match max {
        Some(max) => tablet.entries.partition_point(|e| &e.key <= max),
        None => tablet.entries.len(),
    };
    &tablet.entries[start.min(end)..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tanoak_db_core::Fields;

    fn key(b: &[u8]) -> Key {
        Key::from_slice(b).unwrap()
    }

    fn entry(b: &[u8], v: i64) -> Record {
        let mut fields = Fields::new();
        fields.insert("v".to_string(), json!(v));
        Record::new(key(b), fields)
    }

    fn tablet() -> TabletNode {
        from_records(vec![entry(&[1], 1), entry(&[3], 3), entry(&[5], 5)]).unwrap()
    }

    #[test]
    fn test_from_records_rejects_unordered() {
        assert!(from_records(vec![entry(&[3], 3), entry(&[1], 1)]).is_err());
        assert!(from_records(vec![entry(&[1], 1), entry(&[1], 2)]).is_err());
    }

    #[test]
    fn test_prune_drops_empty_maps() {
        let tablet = from_records(vec![
            entry(&[1], 1),
            Record::empty(key(&[2])),
            entry(&[3], 3),
        ])
        .unwrap();
        let pruned = prune(tablet);
        assert_eq!(pruned.entries.len(), 2);
        assert!(pruned.entries.iter().all(|e| !e.fields.is_empty()));
    }

    #[test]
    fn test_read_batch_returns_requested_in_order() {
        let tablet = tablet();
        // Request includes an absent key; order of request is irrelevant
        let keys: BTreeSet<Key> = [key(&[5]), key(&[2]), key(&[1])].into();
        let found: Vec<&Record> = read_batch(&tablet, &keys).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].key, key(&[1]));
        assert_eq!(found[1].key, key(&[5]));
    }

    #[test]
    fn test_read_range_bounds() {
        let tablet = tablet();
        let mid = read_range(&tablet, Some(&key(&[2])), Some(&key(&[4])));
        assert_eq!(mid.len(), 1);
        assert_eq!(mid[0].key, key(&[3]));

        let all = read_range(&tablet, None, None);
        assert_eq!(all.len(), 3);

        let from = read_range(&tablet, Some(&key(&[3])), None);
        assert_eq!(from.len(), 2);

        let empty = read_range(&tablet, Some(&key(&[6])), None);
        assert!(empty.is_empty());
    }
}
