use pinscan_types::ContentHash;

use crate::error::{StoreError, StoreResult};
use crate::node::Node;

/// Content-addressed block store.
///
/// All implementations must satisfy these invariants:
/// - Blocks are immutable once written; the same bytes always map to the
///   same hash.
/// - `all_hashes` is a point-in-time snapshot and is finite.
/// - Concurrent reads are always safe.
/// - The store never interprets block contents; node decoding happens in the
///   provided `fetch_node`.
pub trait BlockStore: Send + Sync {
    /// Snapshot of every stored block hash, in no particular order.
    fn all_hashes(&self) -> StoreResult<Vec<ContentHash>>;

    /// Read raw block bytes.
    ///
    /// Returns `Ok(None)` if the block does not exist.
    fn get_raw(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>>;

    /// Write raw block bytes and return their hash.
    ///
    /// Writing bytes that already exist is a no-op.
    fn put_raw(&self, bytes: &[u8]) -> StoreResult<ContentHash>;

    /// Fetch a block and decode it as a DAG node.
    ///
    /// Missing blocks yield [`StoreError::NotFound`]; undecodable blocks
    /// yield [`StoreError::CorruptBlock`].
    fn fetch_node(&self, hash: &ContentHash) -> StoreResult<Node> {
        let bytes = self
            .get_raw(hash)?
            .ok_or(StoreError::NotFound(*hash))?;
        Node::decode(&bytes).map_err(|e| StoreError::CorruptBlock {
            hash: *hash,
            reason: e.to_string(),
        })
    }

    /// Encode and store a DAG node.
    fn put_node(&self, node: &Node) -> StoreResult<ContentHash> {
        self.put_raw(&node.encode()?)
    }
}
