//! Bulk tree updates
//!
//! The write path of the data tree. [`update_root`] applies a key-sorted
//! change-set to the current root and yields the new root, stored in the
//! node store:
//!
//! 1. A nil root partitions the change-set's surviving records directly
//! 2. A partition root merges and re-partitions
//! 3. An index root slices the change-set across children by split key,
//!    updates each affected child recursively, and reassembles: carries fold
//!    into siblings, shrunken subtrees graft into neighbors, and child runs
//!    regroup into nodes within branching bounds
//!
//! Unchanged children pass through untouched; because nodes are
//! content-addressed, rebuilding identical content converges to identical
//! digests, so sharing is structural rather than tracked.
//!
//! Given the same root, parameters, and change-set, the algorithm produces
//! byte-identical node contents (all serialized maps are ordered), and
//! therefore identical digests.

mod apply;
mod build;

use crate::partition;
use apply::UpdateOutcome;
use std::time::Instant;
use tanoak_db_core::{ChildRef, NodeStore, Record, Result, TreeParams};
use tanoak_db_patch::{remove_tombstones, ChangeSet};

/// Counters from one bulk update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Partitions written (including re-partitioned survivors)
    pub partitions_written: usize,
    /// Index nodes written
    pub index_nodes_written: usize,
    /// Children passed through untouched
    pub children_reused: usize,
    /// Carries folded into a sibling's update
    pub carries_folded: usize,
}

impl UpdateStats {
    /// Merge another stats into this one.
    pub fn merge(&mut self, other: &UpdateStats) {
        self.partitions_written += other.partitions_written;
        self.index_nodes_written += other.index_nodes_written;
        self.children_reused += other.children_reused;
        self.carries_folded += other.carries_folded;
    }

    /// Total nodes written (partitions plus index nodes).
    pub fn nodes_written(&self) -> usize {
        self.partitions_written + self.index_nodes_written
    }
}

/// Result of a bulk update: the new root (nil when the tree emptied) and
/// update statistics.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    /// The new tree root
    pub root: Option<ChildRef>,
    /// Counters from this update
    pub stats: UpdateStats,
}

/// Apply a change-set to a tree root, yielding the new root.
///
/// The existing root stays intact regardless of outcome; a failed update
/// leaves only unreferenced nodes behind.
pub async fn update_root<S: NodeStore>(
    store: &S,
    params: &TreeParams,
    root: Option<&ChildRef>,
    changes: &ChangeSet,
) -> Result<UpdateResult> {
    params.validate()?;
    let mut stats = UpdateStats::default();
    if changes.is_empty() {
        return Ok(UpdateResult {
            root: root.cloned(),
            stats,
        });
    }

    let started = Instant::now();
    let prior_count = root.map(|r| r.count).unwrap_or(0);
    tracing::debug!(
        changes = changes.len(),
        prior_count = prior_count,
        "bulk update starting"
    );

    let new_root = match root {
        None => {
            let records: Vec<Record> = remove_tombstones(changes.clone()).collect();
            partition_and_build(store, params, records, &mut stats).await?
        }
        Some(root_ref) => {
            let outcome = apply::update_node(
                store,
                params,
                root_ref.clone(),
                changes.clone().into_vec(),
                &mut stats,
            )
            .await?;
            match outcome {
                UpdateOutcome::Carry(records) => {
                    // The whole tree shrank to loose records; a sole
                    // partition below the half bound is legal at the root
                    partition_and_build(store, params, records, &mut stats).await?
                }
                UpdateOutcome::Valid { refs, .. } => {
                    build::build_index(store, params.branching_factor, refs, &mut stats).await?
                }
            }
        }
    };

    tracing::info!(
        changes = changes.len(),
        new_count = new_root.as_ref().map(|r| r.count).unwrap_or(0),
        partitions_written = stats.partitions_written,
        index_nodes_written = stats.index_nodes_written,
        children_reused = stats.children_reused,
        duration_ms = started.elapsed().as_millis() as u64,
        "bulk update complete"
    );

    Ok(UpdateResult {
        root: new_root,
        stats,
    })
}

async fn partition_and_build<S: NodeStore>(
    store: &S,
    params: &TreeParams,
    records: Vec<Record>,
    stats: &mut UpdateStats,
) -> Result<Option<ChildRef>> {
    if records.is_empty() {
        return Ok(None);
    }
    let refs = partition::partition_records(store, params, records).await?;
    stats.partitions_written += refs.len();
    build::build_index(store, params.branching_factor, refs, stats).await
}

/// Build an index over already-stored partitions.
///
/// Zero partitions yield a nil root; one is returned as-is; more stack into
/// index levels until a single root remains.
pub async fn build_index<S: NodeStore>(
    store: &S,
    params: &TreeParams,
    partitions: Vec<ChildRef>,
) -> Result<UpdateResult> {
    let mut stats = UpdateStats::default();
    let root = build::build_index(store, params.branching_factor, partitions, &mut stats).await?;
    Ok(UpdateResult { root, stats })
}
