//! Index-node assembly
//!
//! Helpers that turn a run of valid child references into stored index
//! nodes: balanced grouping within branching bounds, split-key computation,
//! and the bottom-up level builder used for fresh trees and root assembly.

use super::UpdateStats;
use tanoak_db_core::{ChildRef, Error, IndexNode, Node, NodeStore, Result};

/// Balanced group sizes for `n` children under branching factor `b`.
///
/// Produces ceil(n / b) groups with sizes differing by at most one, so every
/// group lands between ceil(b / 2) and b whenever n is at least ceil(b / 2).
pub(crate) fn group_sizes(n: usize, b: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let groups = n.div_ceil(b);
    let base = n / groups;
    let extra = n % groups;
    (0..groups)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

/// Store one index node over the given children.
///
/// Children must be non-empty and of uniform height; split keys are the
/// first keys of the non-leftmost children.
pub(crate) async fn write_index_node<S: NodeStore>(
    store: &S,
    children: Vec<ChildRef>,
    stats: &mut UpdateStats,
) -> Result<ChildRef> {
    let child_height = children
        .first()
        .map(|c| c.height)
        .ok_or_else(|| Error::invalid_argument("index node needs at least one child"))?;
    debug_assert!(children.iter().all(|c| c.height == child_height));

    let height = child_height + 1;
    let keys = children[1..].iter().map(|c| c.first_key.clone()).collect();
    let count = children.iter().map(|c| c.count).sum();
    let first_key = children[0].first_key.clone();

    let node = IndexNode {
        height,
        keys,
        children,
        count,
    };
    let link = store.put(&Node::Index(node)).await?;
    stats.index_nodes_written += 1;

    Ok(ChildRef {
        link,
        height,
        count,
        first_key,
    })
}

/// Wrap a run of uniform-height references into one level of index nodes
/// under the given branching factor.
pub(crate) async fn write_level_with<S: NodeStore>(
    store: &S,
    branching_factor: usize,
    refs: Vec<ChildRef>,
    stats: &mut UpdateStats,
) -> Result<Vec<ChildRef>> {
    let sizes = group_sizes(refs.len(), branching_factor);
    let mut nodes = Vec::with_capacity(sizes.len());
    let mut rest = refs;
    for size in sizes {
        let remainder = rest.split_off(size);
        let group = std::mem::replace(&mut rest, remainder);
        nodes.push(write_index_node(store, group, stats).await?);
    }
    Ok(nodes)
}

/// Build an index over a run of uniform-height references.
///
/// Zero inputs yield a nil root; one input is returned as-is (a single
/// partition needs no index); otherwise consecutive groups of
/// ceil(b/2)..b children stack upward until a single node remains.
pub(crate) async fn build_index<S: NodeStore>(
    store: &S,
    branching_factor: usize,
    refs: Vec<ChildRef>,
    stats: &mut UpdateStats,
) -> Result<Option<ChildRef>> {
    let mut refs = refs;
    while refs.len() > 1 {
        refs = write_level_with(store, branching_factor, refs, stats).await?;
    }
    Ok(refs.pop())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_sizes_balanced() {
        assert_eq!(group_sizes(0, 4), Vec::<usize>::new());
        assert_eq!(group_sizes(3, 4), vec![3]);
        assert_eq!(group_sizes(4, 4), vec![4]);
        assert_eq!(group_sizes(5, 4), vec![3, 2]);
        assert_eq!(group_sizes(9, 4), vec![3, 3, 3]);
        assert_eq!(group_sizes(10, 4), vec![4, 3, 3]);
    }

    #[test]
    fn test_group_sizes_meet_minimum() {
        // Whenever n >= ceil(b/2), every group must land in ceil(b/2)..=b
        for b in [4usize, 6, 16, 256] {
            let min = b.div_ceil(2);
            for n in min..(4 * b) {
                for size in group_sizes(n, b) {
                    assert!(size >= min && size <= b, "n={} b={} size={}", n, b, size);
                }
            }
        }
    }
}
