//! # Tanoak DB Core
//!
//! Core types for Tanoak DB, a hybrid analytic key-value store whose durable
//! representation is a content-addressed Merkle DAG of immutable nodes.
//!
//! This crate provides:
//! - [`Key`]: opaque immutable byte keys with unsigned-lex ordering
//! - Lexicoders: order-preserving codecs from typed values to key bytes
//! - [`BloomFilter`]: per-partition membership filter
//! - The node model ([`Node`], [`PartitionNode`], [`IndexNode`], [`TabletNode`])
//! - Node-store traits and memory/file backends
//! - [`TreeParams`]: tree configuration
//!
//! ## Design Principles
//!
//! 1. **Content-addressed**: node identity is the digest of canonical bytes;
//!    mutation means writing new nodes and advancing a named root elsewhere
//! 2. **Async at the I/O seam only**: node-store calls are the only
//!    suspension points; everything else is pure data transforms
//! 3. **Byte-order is the only order**: every typed ordering reduces to
//!    unsigned lexicographic comparison of encoded keys

pub mod bloom;
pub mod config;
pub mod error;
pub mod key;
pub mod lexicoder;
pub mod node;
pub mod record;
pub mod store;
pub mod value;

pub use bloom::{BloomFilter, DEFAULT_FP_RATE};
pub use config::{
    families_for_fields, TreeParams, DEFAULT_BRANCHING_FACTOR, DEFAULT_PARTITION_LIMIT,
    MIN_BRANCHING_FACTOR,
};
pub use error::{Error, Result};
pub use key::Key;
pub use lexicoder::{coder_for, CoderConfig, Lexicoder};
pub use node::{
    ChildRef, Digest, IndexNode, Node, NodeRef, PartitionNode, TabletNode, BASE_FAMILY,
};
pub use record::{Fields, Record};
pub use store::{
    canonical_bytes, sha256_hex, FileNodeStore, MemoryNodeStore, NodeRead, NodeStore, NodeWrite,
};
pub use value::Value;

/// Prelude for convenient imports of the store traits and common types.
pub mod prelude {
    pub use crate::store::{
        FileNodeStore, MemoryNodeStore, NodeRead, NodeStore, NodeWrite,
    };
    pub use crate::{ChildRef, Fields, Key, Node, NodeRef, Record, TreeParams};
}
