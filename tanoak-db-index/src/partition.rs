//! Partition construction and reads
//!
//! A partition is the leaf of the data tree: one tablet per family, a Bloom
//! filter over the partition's keys, exact count, and inclusive key bounds.
//! Construction projects each record's fields into family tablets (the
//! `base` family receives everything unclaimed and keeps presence markers),
//! stores each non-empty tablet, and assembles the partition metadata.
//!
//! [`partition_records`] chunks a key-ordered record run into size-bounded
//! partitions; tablet writes for distinct partitions pipeline through a
//! bounded pool so memory stays capped while output order is preserved.

use crate::tablet;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeMap, BTreeSet};
use tanoak_db_core::config::families_for_fields;
use tanoak_db_core::record::assert_ascending;
use tanoak_db_core::{
    BloomFilter, ChildRef, Error, Fields, Key, Node, NodeRef, PartitionNode, Record, Result,
    TreeParams, BASE_FAMILY,
};

/// Maximum tablet-write batches in flight during [`partition_records`].
pub const PARTITION_WRITE_CONCURRENCY: usize = 6;

/// Build and store one partition from at most `partition_limit` records.
///
/// Records must be strictly ascending by key with tombstones already
/// resolved. Returns a child reference at height 0.
pub async fn from_records<S: tanoak_db_core::NodeStore>(
    store: &S,
    params: &TreeParams,
    records: Vec<Record>,
) -> Result<ChildRef> {
    if records.is_empty() {
        return Err(Error::invalid_argument(
            "cannot build a partition from zero records",
        ));
    }
    assert_ascending(&records)?;
    if records.len() > params.partition_limit {
        return Err(Error::PartitionOverflow {
            count: records.len(),
            limit: params.partition_limit,
        });
    }

    let count = records.len() as u64;
    let first_key = records[0].key.clone();
    let last_key = records[records.len() - 1].key.clone();

    // Project every record into per-family tablet entries. Base always gets
    // an entry per key (possibly empty) so presence survives projection.
    let mut tablet_entries: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    let mut membership = BloomFilter::with_capacity(params.partition_limit);
    for record in &records {
        membership.insert(record.key.as_bytes());
        for (family, fields) in params.split_fields(&record.fields) {
            if family != BASE_FAMILY && fields.is_empty() {
                continue;
            }
            tablet_entries
                .entry(family)
                .or_default()
                .push(Record::new(record.key.clone(), fields));
        }
    }

    // Store one tablet per non-empty family; BTreeMap order keeps this
    // deterministic.
    let mut tablets: BTreeMap<String, NodeRef> = BTreeMap::new();
    for (family, entries) in tablet_entries {
        if entries.is_empty() {
            continue;
        }
        let node = tablet::from_records(entries)?;
        let link = store.put(&Node::Tablet(node)).await?;
        tablets.insert(family, link);
    }

    let partition = PartitionNode {
        tablets,
        membership,
        count,
        families: params.families.clone(),
        first_key: first_key.clone(),
        last_key,
    };
    let link = store.put(&Node::Partition(partition)).await?;

    Ok(ChildRef {
        link,
        height: 0,
        count,
        first_key,
    })
}

/// Chunk boundaries for a record run, following the streaming rule:
/// accumulate until `L + ceil(L/2)` records are pending, then emit a full
/// partition of `L` and keep the remainder. At end of input, a pending run
/// above `L` splits roughly in half (both halves >= ceil(L/2)); otherwise it
/// becomes one final partition, which may be below the half bound only when
/// it is the sole partition.
fn chunk_bounds(total: usize, params: &TreeParams) -> Vec<std::ops::Range<usize>> {
    let limit = params.partition_limit;
    let threshold = limit + params.min_partition();

    let mut bounds = Vec::new();
    let mut start = 0;
    while total - start >= threshold {
        bounds.push(start..start + limit);
        start += limit;
    }
    let rem = total - start;
    if rem > limit {
        let first = rem.div_ceil(2);
        bounds.push(start..start + first);
        bounds.push(start + first..total);
    } else if rem > 0 {
        bounds.push(start..total);
    }
    bounds
}

/// Partition a key-ordered record run into stored partitions.
///
/// Tablet serialization for distinct partitions proceeds concurrently (at
/// most [`PARTITION_WRITE_CONCURRENCY`] in flight); output partition order
/// matches input key order.
pub async fn partition_records<S: tanoak_db_core::NodeStore>(
    store: &S,
    params: &TreeParams,
    records: Vec<Record>,
) -> Result<Vec<ChildRef>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    assert_ascending(&records)?;

    let bounds = chunk_bounds(records.len(), params);
    let mut chunks: Vec<Vec<Record>> = Vec::with_capacity(bounds.len());
    let mut rest = records;
    for range in bounds.iter().rev() {
        chunks.push(rest.split_off(range.start));
    }
    chunks.reverse();

    stream::iter(
        chunks
            .into_iter()
            .map(|chunk| from_records(store, params, chunk)),
    )
    .buffered(PARTITION_WRITE_CONCURRENCY)
    .try_collect()
    .await
}

/// Load the tablets needed for a field request and merge them by key.
///
/// Per-key field maps union across tablets; conflicts cannot occur because
/// families partition the field space.
async fn load_and_merge<S: tanoak_db_core::NodeRead>(
    store: &S,
    partition: &PartitionNode,
    fields: Option<&BTreeSet<String>>,
    keys: Option<&BTreeSet<Key>>,
    min: Option<&Key>,
    max: Option<&Key>,
) -> Result<Vec<Record>> {
    let wanted = families_for_fields(&partition.families, fields);

    let mut merged: BTreeMap<Key, Fields> = BTreeMap::new();
    for (family, link) in &partition.tablets {
        if !wanted.contains(family) {
            continue;
        }
        let tablet_node = store.get_tablet(&link.digest).await?;
        let entries: Vec<&Record> = match keys {
            Some(keys) => tablet::read_batch(&tablet_node, keys).collect(),
            None => tablet::read_range(&tablet_node, min, max).iter().collect(),
        };
        for entry in entries {
            merged
                .entry(entry.key.clone())
                .or_default()
                .extend(entry.fields.clone());
        }
    }

    let records = merged
        .into_iter()
        .map(|(key, map)| {
            let record = Record::new(key, map);
            match fields {
                Some(requested) => record.project(requested),
                None => record,
            }
        })
        .collect();
    Ok(records)
}

/// Read all of a partition's records, optionally projected to a field set.
pub async fn read_records<S: tanoak_db_core::NodeRead>(
    store: &S,
    partition: &PartitionNode,
    fields: Option<&BTreeSet<String>>,
) -> Result<Vec<Record>> {
    load_and_merge(store, partition, fields, None, None, None).await
}

/// Read the requested keys from a partition, in ascending key order.
///
/// Keys the membership filter rules out are skipped without touching any
/// tablet.
pub async fn read_batch<S: tanoak_db_core::NodeRead>(
    store: &S,
    partition: &PartitionNode,
    keys: &BTreeSet<Key>,
    fields: Option<&BTreeSet<String>>,
) -> Result<Vec<Record>> {
    let candidates: BTreeSet<Key> = keys
        .iter()
        .filter(|key| partition.membership.contains(key.as_bytes()))
        .cloned()
        .collect();
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    load_and_merge(store, partition, fields, Some(&candidates), None, None).await
}

/// Read the records within `[min, max]` (inclusive, `None` = unbounded).
pub async fn read_range<S: tanoak_db_core::NodeRead>(
    store: &S,
    partition: &PartitionNode,
    min: Option<&Key>,
    max: Option<&Key>,
    fields: Option<&BTreeSet<String>>,
) -> Result<Vec<Record>> {
    load_and_merge(store, partition, fields, None, min, max).await
}
