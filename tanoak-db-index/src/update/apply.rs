//! Recursive node updates
//!
//! [`update_node`] applies a change slice to one subtree and yields an
//! update outcome:
//!
//! - `Carry(records)`: the subtree shrank below a viable partition; its
//!   surviving records are carried up for merging with a sibling
//! - `Valid { height, refs }`: zero or more valid replacement references.
//!   `height` normally equals the input subtree's height; it is lower when
//!   the subtree shrank so far that no valid node could be built at the
//!   original height, in which case the caller grafts the references into a
//!   neighboring subtree at the matching level
//!
//! Reassembly at an index node folds carries forward into the next updated
//! sibling (and trailing carries backward into the previous one), grafts
//! shrunken results into neighbors, and regroups the surviving child run
//! into nodes within branching bounds. Every reference a `Valid` outcome
//! carries satisfies the tree invariants on its own; underfull nodes are
//! never written.

use super::build::{write_index_node, write_level_with};
use super::UpdateStats;
use crate::partition;
use futures::future::BoxFuture;
use futures::FutureExt;
use tanoak_db_core::{ChildRef, IndexNode, NodeStore, Record, Result, TreeParams};
use tanoak_db_patch::{patch_seq, remove_tombstones, Change};

/// Result of updating one subtree.
pub(crate) enum UpdateOutcome {
    /// Loose records, to be merged into a sibling subtree
    Carry(Vec<Record>),
    /// Valid replacement references of uniform `height`
    Valid {
        /// Height of every reference in `refs` (meaningless when empty)
        height: u32,
        /// Zero or more valid references, in key order
        refs: Vec<ChildRef>,
    },
}

/// Which edge of a subtree to graft shrunken references onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GraftSide {
    /// References sort before the subtree
    Left,
    /// References sort after the subtree
    Right,
}

/// Partition a change run across an index node's children by split key.
///
/// Change `i` belongs to the child whose key range contains it: the largest
/// child index whose split lower bound is at or below the change key.
fn slice_changes(node: &IndexNode, changes: Vec<Change>) -> Vec<Vec<Change>> {
    let mut slices: Vec<Vec<Change>> = (0..node.children.len()).map(|_| Vec::new()).collect();
    let mut idx = 0;
    for change in changes {
        while idx < node.keys.len() && node.keys[idx] <= change.key {
            idx += 1;
        }
        slices[idx].push(change);
    }
    slices
}

fn records_to_puts(records: Vec<Record>) -> Vec<Change> {
    records
        .into_iter()
        .map(|record| Change::put(record.key, record.fields))
        .collect()
}

/// Apply a non-empty change slice to the subtree under `child`.
pub(crate) fn update_node<'a, S: NodeStore>(
    store: &'a S,
    params: &'a TreeParams,
    child: ChildRef,
    changes: Vec<Change>,
    stats: &'a mut UpdateStats,
) -> BoxFuture<'a, Result<UpdateOutcome>> {
    async move {
        if child.height == 0 {
            update_partition(store, params, child, changes, stats).await
        } else {
            update_index(store, params, child, changes, stats).await
        }
    }
    .boxed()
}

/// Merge changes into a partition and re-partition the result.
async fn update_partition<S: NodeStore>(
    store: &S,
    params: &TreeParams,
    child: ChildRef,
    changes: Vec<Change>,
    stats: &mut UpdateStats,
) -> Result<UpdateOutcome> {
    let node = store.get_partition(&child.link.digest).await?;
    let existing = partition::read_records(store, &node, None).await?;
    let merged: Vec<Record> = remove_tombstones(patch_seq(changes, existing)).collect();

    if merged.is_empty() {
        return Ok(UpdateOutcome::Valid {
            height: 0,
            refs: Vec::new(),
        });
    }
    if merged.len() < params.min_partition() {
        return Ok(UpdateOutcome::Carry(merged));
    }

    let refs = partition::partition_records(store, params, merged).await?;
    stats.partitions_written += refs.len();
    Ok(UpdateOutcome::Valid { height: 0, refs })
}

/// Update an index node's children and reassemble.
async fn update_index<S: NodeStore>(
    store: &S,
    params: &TreeParams,
    child: ChildRef,
    changes: Vec<Change>,
    stats: &mut UpdateStats,
) -> Result<UpdateOutcome> {
    let node = store.get_index(&child.link.digest).await?;
    let mut slices = slice_changes(&node, changes);

    // Left-to-right pass; carries fold forward into the next sibling's
    // update (carry keys always sort below the next sibling's slice).
    let mut results: Vec<UpdateOutcome> = Vec::new();
    let mut carry: Vec<Record> = Vec::new();
    for (i, child_ref) in node.children.iter().enumerate() {
        let mut slice = std::mem::take(&mut slices[i]);
        if !carry.is_empty() {
            let mut folded = records_to_puts(std::mem::take(&mut carry));
            folded.append(&mut slice);
            slice = folded;
            stats.carries_folded += 1;
        }
        if slice.is_empty() {
            stats.children_reused += 1;
            results.push(UpdateOutcome::Valid {
                height: child_ref.height,
                refs: vec![child_ref.clone()],
            });
            continue;
        }
        match update_node(store, params, child_ref.clone(), slice, stats).await? {
            UpdateOutcome::Carry(records) => carry = records,
            valid => results.push(valid),
        }
    }

    // A trailing carry folds backward into the rightmost surviving sibling.
    while !carry.is_empty() {
        let target = loop {
            match results.pop() {
                // Every sibling dissolved: the whole subtree is loose records
                None => return Ok(UpdateOutcome::Carry(carry)),
                Some(UpdateOutcome::Valid { refs, .. }) if refs.is_empty() => continue,
                Some(valid) => break valid,
            }
        };
        let UpdateOutcome::Valid { height, mut refs } = target else {
            unreachable!("results never hold carries");
        };
        let last = refs.pop().expect("refs checked non-empty");
        if !refs.is_empty() {
            results.push(UpdateOutcome::Valid { height, refs });
        }
        let puts = records_to_puts(std::mem::take(&mut carry));
        stats.carries_folded += 1;
        match update_node(store, params, last, puts, stats).await? {
            UpdateOutcome::Carry(records) => carry = records,
            valid => results.push(valid),
        }
    }

    reassemble(store, params, child.height, results, stats).await
}

/// Fuse per-sibling results into a uniform-height child run and regroup.
async fn reassemble<S: NodeStore>(
    store: &S,
    params: &TreeParams,
    node_height: u32,
    results: Vec<UpdateOutcome>,
    stats: &mut UpdateStats,
) -> Result<UpdateOutcome> {
    let parts: Vec<(u32, Vec<ChildRef>)> = results
        .into_iter()
        .filter_map(|result| match result {
            UpdateOutcome::Valid { height, refs } if !refs.is_empty() => Some((height, refs)),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        return Ok(UpdateOutcome::Valid {
            height: node_height,
            refs: Vec::new(),
        });
    }

    let base_height = parts.iter().map(|(h, _)| *h).max().expect("non-empty");

    // Splice base-height runs directly; graft shrunken (lower-height) runs
    // into the adjacent base-height subtree at the matching level.
    let mut flat: Vec<ChildRef> = Vec::new();
    let mut leading: Vec<(u32, Vec<ChildRef>)> = Vec::new();
    for (height, refs) in parts {
        if height == base_height {
            if flat.is_empty() && !leading.is_empty() {
                let mut head = vec![refs[0].clone()];
                for (low_height, low_refs) in leading.drain(..).rev() {
                    let first = head.remove(0);
                    let mut replaced = graft(
                        store, params, first, low_height, low_refs, GraftSide::Left, stats,
                    )
                    .await?;
                    replaced.append(&mut head);
                    head = replaced;
                }
                flat.append(&mut head);
                flat.extend(refs.into_iter().skip(1));
            } else {
                flat.extend(refs);
            }
        } else if flat.is_empty() {
            leading.push((height, refs));
        } else {
            let last = flat.pop().expect("flat non-empty");
            let replaced = graft(
                store, params, last, height, refs, GraftSide::Right, stats,
            )
            .await?;
            flat.extend(replaced);
        }
    }

    // Regroup upward as long as the run can fill valid nodes at each level.
    let mut height = base_height;
    let mut refs = flat;
    while height < node_height && refs.len() >= params.min_children() {
        refs = write_level_with(store, params.branching_factor, refs, stats).await?;
        height += 1;
    }
    Ok(UpdateOutcome::Valid { height, refs })
}

/// Graft lower-height references onto one edge of a subtree.
///
/// Descends the subtree's edge spine to the level just above the grafted
/// references, pools them with that node's children, and rebuilds the spine
/// bottom-up. Returns the subtree's valid replacement references (more than
/// one if pooling overflowed the branching factor).
fn graft<'a, S: NodeStore>(
    store: &'a S,
    params: &'a TreeParams,
    base: ChildRef,
    low_height: u32,
    low_refs: Vec<ChildRef>,
    side: GraftSide,
    stats: &'a mut UpdateStats,
) -> BoxFuture<'a, Result<Vec<ChildRef>>> {
    async move {
        debug_assert!(base.height > low_height);
        let node = store.get_index(&base.link.digest).await?;
        let mut children = node.children;

        if low_height == base.height - 1 {
            match side {
                GraftSide::Left => {
                    let mut pooled = low_refs;
                    pooled.append(&mut children);
                    children = pooled;
                }
                GraftSide::Right => children.extend(low_refs),
            }
        } else {
            let edge = match side {
                GraftSide::Left => 0,
                GraftSide::Right => children.len() - 1,
            };
            let edge_ref = children[edge].clone();
            let replaced = graft(store, params, edge_ref, low_height, low_refs, side, stats).await?;
            children.splice(edge..=edge, replaced);
        }

        if children.len() <= params.branching_factor {
            Ok(vec![write_index_node(store, children, stats).await?])
        } else {
            write_level_with(store, params.branching_factor, children, stats).await
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tanoak_db_core::{Key, NodeRef};

    fn key(b: u8) -> Key {
        Key::from_slice(&[b]).unwrap()
    }

    fn child(first: u8) -> ChildRef {
        ChildRef {
            link: NodeRef::link("partition", format!("{:02x}", first), None),
            height: 0,
            count: 1,
            first_key: key(first),
        }
    }

    #[test]
    fn test_slice_changes_routes_by_split_key() {
        let node = IndexNode {
            height: 1,
            keys: vec![key(10), key(20)],
            children: vec![child(0), child(10), child(20)],
            count: 3,
        };
        let changes = vec![
            Change::tombstone(key(1)),
            Change::tombstone(key(9)),
            Change::tombstone(key(10)),
            Change::tombstone(key(19)),
            Change::tombstone(key(20)),
            Change::tombstone(key(200)),
        ];
        let slices = slice_changes(&node, changes);
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].len(), 2);
        // A change at the split key belongs to the right child
        assert_eq!(slices[1].len(), 2);
        assert_eq!(slices[2].len(), 2);
    }

    #[test]
    fn test_slice_changes_all_before_first_split() {
        let node = IndexNode {
            height: 1,
            keys: vec![key(100)],
            children: vec![child(0), child(100)],
            count: 2,
        };
        let slices = slice_changes(&node, vec![Change::tombstone(key(1))]);
        assert_eq!(slices[0].len(), 1);
        assert!(slices[1].is_empty());
    }
}
