//! Tree read paths
//!
//! - [`Scan`]: a lazy, forward-only, key-ascending cursor over a key range.
//!   Index nodes load on descent and partitions load one at a time, so
//!   memory tracks the largest partition rather than the result set
//! - [`read_batch`]: point/batch lookup that descends by split key and lets
//!   each partition's membership filter rule keys out before any tablet
//!   loads

use crate::partition;
use std::collections::{BTreeSet, VecDeque};
use std::ops::Bound;
use tanoak_db_core::{ChildRef, Key, NodeRead, Record, Result};

/// Key-range bounds for a scan. `Unbounded` means open on that side.
#[derive(Clone, Debug)]
pub struct ScanRange {
    /// Lower bound
    pub start: Bound<Key>,
    /// Upper bound
    pub end: Bound<Key>,
}

impl Default for ScanRange {
    fn default() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }
}

impl ScanRange {
    /// The full-key-space range.
    pub fn all() -> Self {
        Self::default()
    }

    /// Inclusive `[start, end]`, either side optional.
    pub fn between(start: Option<Key>, end: Option<Key>) -> Self {
        Self {
            start: start.map_or(Bound::Unbounded, Bound::Included),
            end: end.map_or(Bound::Unbounded, Bound::Included),
        }
    }

    fn contains(&self, key: &Key) -> bool {
        let above = match &self.start {
            Bound::Unbounded => true,
            Bound::Included(s) => key >= s,
            Bound::Excluded(s) => key > s,
        };
        let below = match &self.end {
            Bound::Unbounded => true,
            Bound::Included(e) => key <= e,
            Bound::Excluded(e) => key < e,
        };
        above && below
    }

    fn min_key(&self) -> Option<&Key> {
        match &self.start {
            Bound::Included(k) | Bound::Excluded(k) => Some(k),
            Bound::Unbounded => None,
        }
    }

    fn max_key(&self) -> Option<&Key> {
        match &self.end {
            Bound::Included(k) | Bound::Excluded(k) => Some(k),
            Bound::Unbounded => None,
        }
    }
}

/// Lazy key-ordered scan over the tree.
///
/// Drive with [`Scan::next`]; each call yields the next record, loading
/// nodes only as the cursor reaches them.
pub struct Scan<'a, S> {
    store: &'a S,
    range: ScanRange,
    fields: Option<BTreeSet<String>>,
    // Children yet to visit, leftmost last (pop order = key order)
    stack: Vec<ChildRef>,
    buffer: VecDeque<Record>,
}

impl<'a, S: NodeRead> Scan<'a, S> {
    /// Open a scan over `root` (pass `None` for an empty tree).
    pub fn new(
        store: &'a S,
        root: Option<&ChildRef>,
        range: ScanRange,
        fields: Option<BTreeSet<String>>,
    ) -> Self {
        Self {
            store,
            range,
            fields,
            stack: root.into_iter().cloned().collect(),
            buffer: VecDeque::new(),
        }
    }

    /// The next record in key order, or `None` at end of range.
    pub async fn next(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Ok(Some(record));
            }
            let Some(child) = self.stack.pop() else {
                return Ok(None);
            };
            if child.height == 0 {
                let node = self.store.get_partition(&child.link.digest).await?;
                let records = partition::read_range(
                    self.store,
                    &node,
                    self.range.min_key(),
                    self.range.max_key(),
                    self.fields.as_ref(),
                )
                .await?;
                self.buffer
                    .extend(records.into_iter().filter(|r| self.range.contains(&r.key)));
            } else {
                let node = self.store.get_index(&child.link.digest).await?;
                // Contiguous sub-range of children overlapping the scan range
                let lo = match self.range.min_key() {
                    Some(start) => node.keys.partition_point(|k| k <= start),
                    None => 0,
                };
                let hi = match &self.range.end {
                    Bound::Included(end) => node.keys.partition_point(|k| k <= end),
                    Bound::Excluded(end) => node.keys.partition_point(|k| k < end),
                    Bound::Unbounded => node.children.len() - 1,
                };
                if lo > hi {
                    // Degenerate range straddling a split key
                    continue;
                }
                for child in node.children[lo..=hi].iter().rev() {
                    self.stack.push(child.clone());
                }
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

/// Read the requested keys, in ascending key order.
///
/// Descends to each candidate partition by split-key comparison; at the
/// partition, the membership filter skips keys that are definitely absent.
/// Caller-provided key order (and duplicates) are irrelevant.
pub async fn read_batch<S: NodeRead>(
    store: &S,
    root: Option<&ChildRef>,
    keys: &[Key],
    fields: Option<&BTreeSet<String>>,
) -> Result<Vec<Record>> {
    let Some(root) = root else {
        return Ok(Vec::new());
    };
    let wanted: BTreeSet<Key> = keys.iter().cloned().collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    // (child, keys routed to it); children visited in key order
    let mut stack: Vec<(ChildRef, BTreeSet<Key>)> = vec![(root.clone(), wanted)];
    while let Some((child, keys)) = stack.pop() {
        if child.height == 0 {
            let node = store.get_partition(&child.link.digest).await?;
            out.extend(partition::read_batch(store, &node, &keys, fields).await?);
            continue;
        }
        let node = store.get_index(&child.link.digest).await?;
        let mut routed: Vec<BTreeSet<Key>> =
            (0..node.children.len()).map(|_| BTreeSet::new()).collect();
        for key in keys {
            let idx = node.child_index_for(&key);
            routed[idx].insert(key);
        }
        for (child, keys) in node.children.iter().zip(routed).rev() {
            if !keys.is_empty() {
                stack.push((child.clone(), keys));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> Key {
        Key::from_slice(&[b]).unwrap()
    }

    #[test]
    fn test_scan_range_contains() {
        let range = ScanRange {
            start: Bound::Included(key(2)),
            end: Bound::Excluded(key(5)),
        };
        assert!(!range.contains(&key(1)));
        assert!(range.contains(&key(2)));
        assert!(range.contains(&key(4)));
        assert!(!range.contains(&key(5)));

        assert!(ScanRange::all().contains(&key(0)));
    }

    #[test]
    fn test_scan_range_between() {
        let range = ScanRange::between(Some(key(1)), None);
        assert!(range.contains(&key(1)));
        assert!(range.contains(&key(200)));
        assert!(!range.contains(&key(0)));
    }
}
