//! Reachability for external garbage collection
//!
//! Nodes unreferenced by any live root are garbage, but the store owns
//! reclamation. [`reachable_digests`] walks a root and returns every digest
//! it references (itself, index descendants, partitions, tablets), which is
//! the primitive a mark-and-sweep collector needs.

use std::collections::BTreeSet;
use tanoak_db_core::{Node, NodeRead, Result};

/// Every digest reachable from `root_digest`, including itself, sorted.
pub async fn reachable_digests<S: NodeRead>(
    store: &S,
    root_digest: &str,
) -> Result<BTreeSet<String>> {
    let mut reachable = BTreeSet::new();
    let mut pending = vec![root_digest.to_string()];

    while let Some(digest) = pending.pop() {
        if !reachable.insert(digest.clone()) {
            continue;
        }
        match store.get(&digest).await? {
            Node::Tablet(_) => {}
            Node::Partition(partition) => {
                pending.extend(partition.tablets.values().map(|link| link.digest.clone()));
            }
            Node::Index(index) => {
                pending.extend(index.children.iter().map(|c| c.link.digest.clone()));
            }
        }
    }
    Ok(reachable)
}
