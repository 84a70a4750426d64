//! Node model for the content-addressed data tree
//!
//! Three node shapes flow through read and update paths:
//!
//! - **Tablet**: a sorted chunk of (key, partial field map) entries for one
//!   column family within one partition
//! - **Partition**: the leaf of the data tree, holding one tablet reference
//!   per family plus a membership filter and key bounds
//! - **Index**: an internal node holding split keys and child references
//!
//! Nodes are immutable once stored; identity is the SHA-256 digest of the
//! canonical JSON encoding. References between nodes are digests, never
//! pointers, so cycles are impossible by construction.

use crate::bloom::BloomFilter;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Content digest of a stored node: hex SHA-256 of its canonical bytes.
pub type Digest = String;

/// Name of the implicit family holding unclaimed fields.
pub const BASE_FAMILY: &str = "base";

/// A named reference to a stored node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    /// What the reference points at (a data type tag)
    pub name: String,
    /// Content digest of the target node
    pub digest: Digest,
    /// Serialized byte size of the target, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl NodeRef {
    /// Create a named reference.
    pub fn link(name: impl Into<String>, digest: impl Into<Digest>, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            digest: digest.into(),
            size,
        }
    }
}

/// Reference to a child of an index node (or to a tree root).
///
/// Carries enough metadata to route updates and reads without loading the
/// child: its height (0 for partitions), record count, and first key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRef {
    /// Link to the child node
    pub link: NodeRef,
    /// Height of the child (0 = partition)
    pub height: u32,
    /// Records in the child subtree
    pub count: u64,
    /// First key reachable through the child
    pub first_key: Key,
}

/// A sorted chunk of records for one column family.
///
/// Keys are strictly ascending. Tablets never contain tombstones, and only
/// the `base` family may contain entries with empty field maps (presence
/// markers).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TabletNode {
    /// (key, partial field map) entries in ascending key order
    pub entries: Vec<Record>,
}

/// The leaf node of the data tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartitionNode {
    /// Family name -> tablet reference (always includes `base`)
    pub tablets: BTreeMap<String, NodeRef>,
    /// Bloom filter over the partition's keys
    pub membership: BloomFilter,
    /// Exact record count
    pub count: u64,
    /// Family definition in effect when the partition was built
    pub families: BTreeMap<String, BTreeSet<String>>,
    /// Smallest key in the partition (inclusive)
    pub first_key: Key,
    /// Largest key in the partition (inclusive)
    pub last_key: Key,
}

/// An internal node of the data tree.
///
/// `keys[i]` is the inclusive lower bound of `children[i + 1]`: every key
/// reachable through `children[i]` is strictly below `keys[i]`, and every
/// key through `children[i + 1]` is at or above it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexNode {
    /// Height of this node (>= 1; children have height - 1)
    pub height: u32,
    /// Split keys, strictly ascending, length children - 1
    pub keys: Vec<Key>,
    /// Child references, all of height `height - 1`
    pub children: Vec<ChildRef>,
    /// Sum of descendant record counts
    pub count: u64,
}

impl IndexNode {
    /// Index of the child whose key range contains `key`.
    ///
    /// The largest i with `keys[i - 1] <= key`, or 0 if none (split keys are
    /// inclusive lower bounds of the right child).
    pub fn child_index_for(&self, key: &Key) -> usize {
        self.keys.partition_point(|split| split <= key)
    }
}

/// A stored node value, discriminated by its `data/type` tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "data/type", rename_all = "lowercase")]
pub enum Node {
    /// Column-family tablet
    Tablet(TabletNode),
    /// Leaf partition
    Partition(PartitionNode),
    /// Internal index node
    Index(IndexNode),
}

impl Node {
    /// The `data/type` tag of this node.
    pub fn data_type(&self) -> &'static str {
        match self {
            Node::Tablet(_) => "tablet",
            Node::Partition(_) => "partition",
            Node::Index(_) => "index",
        }
    }

    /// Check structural invariants, reporting the failing attribute.
    ///
    /// `digest` identifies the node in the error.
    pub fn validate(&self, digest: &str) -> Result<()> {
        match self {
            Node::Tablet(tablet) => {
                for pair in tablet.entries.windows(2) {
                    if pair[0].key >= pair[1].key {
                        return Err(Error::corrupt_node(
                            digest,
                            format!(
                                "tablet entries out of order: {} !< {}",
                                pair[0].key, pair[1].key
                            ),
                        ));
                    }
                }
                Ok(())
            }
            Node::Partition(part) => {
                if part.first_key > part.last_key {
                    return Err(Error::corrupt_node(
                        digest,
                        format!(
                            "first-key {} exceeds last-key {}",
                            part.first_key, part.last_key
                        ),
                    ));
                }
                if part.count == 0 {
                    return Err(Error::corrupt_node(digest, "partition count is zero"));
                }
                if !part.tablets.contains_key(BASE_FAMILY) {
                    return Err(Error::corrupt_node(digest, "partition missing base tablet"));
                }
                Ok(())
            }
            Node::Index(index) => {
                if index.height == 0 {
                    return Err(Error::corrupt_node(digest, "index node height is zero"));
                }
                if index.children.len() != index.keys.len() + 1 {
                    return Err(Error::corrupt_node(
                        digest,
                        format!(
                            "child count {} != split keys {} + 1",
                            index.children.len(),
                            index.keys.len()
                        ),
                    ));
                }
                for pair in index.keys.windows(2) {
                    if pair[0] >= pair[1] {
                        return Err(Error::corrupt_node(
                            digest,
                            format!("split keys out of order: {} !< {}", pair[0], pair[1]),
                        ));
                    }
                }
                for child in &index.children {
                    if child.height != index.height - 1 {
                        return Err(Error::corrupt_node(
                            digest,
                            format!(
                                "child height {} != node height {} - 1",
                                child.height, index.height
                            ),
                        ));
                    }
                }
                for (split, right) in index.keys.iter().zip(&index.children[1..]) {
                    if &right.first_key != split {
                        return Err(Error::corrupt_node(
                            digest,
                            format!(
                                "split key {} != right child first-key {}",
                                split, right.first_key
                            ),
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: &[u8]) -> Key {
        Key::from_slice(b).unwrap()
    }

    fn child(first: &[u8], height: u32) -> ChildRef {
        ChildRef {
            link: NodeRef::link("partition", "abc", None),
            height,
            count: 10,
            first_key: key(first),
        }
    }

    #[test]
    fn test_node_tag_round_trip() {
        let node = Node::Tablet(TabletNode {
            entries: vec![Record::empty(key(&[1]))],
        });
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"data/type\":\"tablet\""));
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_child_index_for() {
        let node = IndexNode {
            height: 1,
            keys: vec![key(&[10]), key(&[20])],
            children: vec![child(&[1], 0), child(&[10], 0), child(&[20], 0)],
            count: 30,
        };
        assert_eq!(node.child_index_for(&key(&[5])), 0);
        // Split keys are inclusive lower bounds of the right child
        assert_eq!(node.child_index_for(&key(&[10])), 1);
        assert_eq!(node.child_index_for(&key(&[15])), 1);
        assert_eq!(node.child_index_for(&key(&[20])), 2);
        assert_eq!(node.child_index_for(&key(&[99])), 2);
    }

    #[test]
    fn test_validate_index_child_count() {
        let node = Node::Index(IndexNode {
            height: 1,
            keys: vec![key(&[10]), key(&[20])],
            children: vec![child(&[1], 0), child(&[10], 0)],
            count: 20,
        });
        let err = node.validate("deadbeef").unwrap_err();
        assert!(matches!(err, Error::CorruptNode { .. }));
    }

    #[test]
    fn test_validate_split_key_alignment() {
        let node = Node::Index(IndexNode {
            height: 1,
            keys: vec![key(&[10])],
            children: vec![child(&[1], 0), child(&[11], 0)],
            count: 20,
        });
        assert!(node.validate("deadbeef").is_err());
    }

    #[test]
    fn test_validate_partition_bounds() {
        let part = PartitionNode {
            tablets: BTreeMap::from([(
                BASE_FAMILY.to_string(),
                NodeRef::link("tablet", "t0", None),
            )]),
            membership: crate::bloom::BloomFilter::with_capacity(4),
            count: 1,
            families: BTreeMap::new(),
            first_key: key(&[9]),
            last_key: key(&[1]),
        };
        assert!(Node::Partition(part).validate("deadbeef").is_err());
    }
}
