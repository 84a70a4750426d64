//! Node store traits and built-in backends
//!
//! The node store is a content-addressed blob store keyed by digest: `put`
//! serializes a node to canonical bytes, hashes them, and writes idempotently
//! (equal node values yield equal digests); `get` loads, deserializes, and
//! validates. These calls are the core's only suspension points, so the
//! traits are `async_trait` and runtime-agnostic.
//!
//! Built-in backends:
//!
//! - [`MemoryNodeStore`]: in-memory map, the test backend
//! - [`FileNodeStore`]: one JSON file per node under `{base}/{kind}/{digest}`

use crate::error::{Error, Result};
use crate::node::{IndexNode, Node, NodeRef, PartitionNode, TabletNode};
use async_trait::async_trait;
use sha2::Digest as _;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

/// Compute the hex SHA-256 digest of a byte string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Serialize a node to its canonical byte encoding.
///
/// All maps in the node model are `BTreeMap`s and struct fields serialize in
/// declaration order, so equal node values always produce identical bytes
/// (and therefore identical digests).
pub fn canonical_bytes(node: &Node) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(node)?)
}

/// Read side of the node store.
#[async_trait]
pub trait NodeRead: Debug + Send + Sync {
    /// Load a node by digest.
    ///
    /// Fails with missing-node when the digest is absent, and corrupt-node
    /// when the stored value fails structural validation.
    async fn get(&self, digest: &str) -> Result<Node>;

    /// Load a node and require the tablet shape.
    async fn get_tablet(&self, digest: &str) -> Result<TabletNode> {
        match self.get(digest).await? {
            Node::Tablet(tablet) => Ok(tablet),
            other => Err(type_mismatch(digest, "tablet", &other)),
        }
    }

    /// Load a node and require the partition shape.
    async fn get_partition(&self, digest: &str) -> Result<PartitionNode> {
        match self.get(digest).await? {
            Node::Partition(partition) => Ok(partition),
            other => Err(type_mismatch(digest, "partition", &other)),
        }
    }

    /// Load a node and require the index shape.
    async fn get_index(&self, digest: &str) -> Result<IndexNode> {
        match self.get(digest).await? {
            Node::Index(index) => Ok(index),
            other => Err(type_mismatch(digest, "index", &other)),
        }
    }
}

fn type_mismatch(digest: &str, expected: &'static str, actual: &Node) -> Error {
    Error::TypeMismatch {
        digest: digest.to_string(),
        expected,
        actual: actual.data_type(),
    }
}

/// Write side of the node store.
#[async_trait]
pub trait NodeWrite: Debug + Send + Sync {
    /// Store a node, returning a reference carrying its content digest.
    ///
    /// Idempotent: storing an equal node value yields an equal reference.
    async fn put(&self, node: &Node) -> Result<NodeRef>;
}

/// Full node-store capability marker.
pub trait NodeStore: NodeRead + NodeWrite {}
impl<T: NodeRead + NodeWrite> NodeStore for T {}

fn decode_node(digest: &str, bytes: &[u8]) -> Result<Node> {
    let node: Node = serde_json::from_slice(bytes)
        .map_err(|e| Error::corrupt_node(digest, format!("undecodable node: {}", e)))?;
    node.validate(digest)?;
    Ok(node)
}

// ============================================================================
// MemoryNodeStore
// ============================================================================

/// In-memory node store for tests and ephemeral trees.
///
/// Stores canonical bytes (not deserialized values) so `get` exercises the
/// same decode/validate path as durable backends.
#[derive(Debug, Clone, Default)]
pub struct MemoryNodeStore {
    nodes: Arc<RwLock<std::collections::HashMap<String, Vec<u8>>>>,
}

impl MemoryNodeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct nodes stored.
    pub fn len(&self) -> usize {
        self.nodes.read().expect("RwLock poisoned").len()
    }

    /// True when nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored digests, sorted.
    pub fn digests(&self) -> Vec<String> {
        let mut digests: Vec<String> = self
            .nodes
            .read()
            .expect("RwLock poisoned")
            .keys()
            .cloned()
            .collect();
        digests.sort();
        digests
    }
}

#[async_trait]
impl NodeRead for MemoryNodeStore {
    async fn get(&self, digest: &str) -> Result<Node> {
        let bytes = self
            .nodes
            .read()
            .expect("RwLock poisoned")
            .get(digest)
            .cloned()
            .ok_or_else(|| Error::missing_node(digest))?;
        decode_node(digest, &bytes)
    }
}

#[async_trait]
impl NodeWrite for MemoryNodeStore {
    async fn put(&self, node: &Node) -> Result<NodeRef> {
        let bytes = canonical_bytes(node)?;
        let digest = sha256_hex(&bytes);
        let size = bytes.len() as u64;
        self.nodes
            .write()
            .expect("RwLock poisoned")
            .entry(digest.clone())
            .or_insert(bytes);
        Ok(NodeRef::link(node.data_type(), digest, Some(size)))
    }
}

// ============================================================================
// FileNodeStore
// ============================================================================

/// File-backed node store: `{base}/{data_type}/{digest}.json`.
#[derive(Debug, Clone)]
pub struct FileNodeStore {
    base_path: std::path::PathBuf,
}

impl FileNodeStore {
    /// Create a store rooted at the given directory.
    pub fn new(base_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// The store's base directory.
    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    fn resolve(&self, kind: &str, digest: &str) -> Result<std::path::PathBuf> {
        // Digests are hex, but reject anything path-like defensively
        if digest.is_empty() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::storage(format!(
                "invalid node digest '{}': must be hex",
                digest
            )));
        }
        Ok(self.base_path.join(kind).join(format!("{}.json", digest)))
    }

    async fn find(&self, digest: &str) -> Result<Vec<u8>> {
        for kind in ["tablet", "partition", "index"] {
            let path = self.resolve(kind, digest)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::io(format!(
                        "failed to read {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
        Err(Error::missing_node(digest))
    }
}

#[async_trait]
impl NodeRead for FileNodeStore {
    async fn get(&self, digest: &str) -> Result<Node> {
        let bytes = self.find(digest).await?;
        decode_node(digest, &bytes)
    }
}

#[async_trait]
impl NodeWrite for FileNodeStore {
    async fn put(&self, node: &Node) -> Result<NodeRef> {
        let bytes = canonical_bytes(node)?;
        let digest = sha256_hex(&bytes);
        let path = self.resolve(node.data_type(), &digest)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::io(format!(
                    "failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        // Overwrite is idempotent for content-addressed data
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| Error::io(format!("failed to write {}: {}", path.display(), e)))?;

        Ok(NodeRef::link(
            node.data_type(),
            digest,
            Some(bytes.len() as u64),
        ))
    }
}
