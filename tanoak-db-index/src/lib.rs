//! # Tanoak DB Index
//!
//! The copy-on-write data tree of Tanoak DB: a B+-tree variant over
//! size-bounded, key-ordered partitions, stored as a content-addressed
//! Merkle DAG.
//!
//! This crate provides:
//! - Tablet and partition construction ([`tablet`], [`partition`])
//! - The bulk-update algorithm ([`update_root`]): applies a key-sorted batch
//!   of puts and tombstones to a root and yields a new valid root, splitting
//!   and merging partitions and rebalancing index levels as needed
//! - Lazy read cursors and batch lookups ([`Scan`], [`read_batch`])
//! - The reachability walk external garbage collectors build on
//!   ([`reachable_digests`])
//!
//! Nodes are immutable; an update never touches reachable nodes, so readers
//! holding a prior root keep a consistent snapshot with no locking. A
//! cancelled or failed update leaves only unreferenced nodes behind.

pub mod gc;
pub mod partition;
pub mod read;
pub mod tablet;
pub mod update;

pub use gc::reachable_digests;
pub use read::{read_batch, Scan, ScanRange};
pub use update::{build_index, update_root, UpdateResult, UpdateStats};
