use std::collections::HashMap;
use std::sync::RwLock;

use pinscan_types::ContentHash;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

/// In-memory, HashMap-based block store.
///
/// Intended for tests and embedding. Every `get_raw` call is counted per
/// hash so traversal tests can assert how often a block was read.
pub struct InMemoryBlockStore {
    blocks: RwLock<HashMap<ContentHash, Vec<u8>>>,
    reads: RwLock<HashMap<ContentHash, usize>>,
}

impl InMemoryBlockStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
            reads: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times `hash` has been read.
    pub fn read_count(&self, hash: &ContentHash) -> usize {
        self.reads
            .read()
            .map(|m| m.get(hash).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total reads across all hashes.
    pub fn total_reads(&self) -> usize {
        self.reads.read().map(|m| m.values().sum()).unwrap_or(0)
    }

    /// Forget all recorded reads.
    pub fn reset_reads(&self) {
        if let Ok(mut reads) = self.reads.write() {
            reads.clear();
        }
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}

impl BlockStore for InMemoryBlockStore {
    fn all_hashes(&self) -> StoreResult<Vec<ContentHash>> {
        let map = self.blocks.read().map_err(poisoned)?;
        Ok(map.keys().copied().collect())
    }

    fn get_raw(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>> {
        *self.reads.write().map_err(poisoned)?.entry(*hash).or_insert(0) += 1;
        let map = self.blocks.read().map_err(poisoned)?;
        Ok(map.get(hash).cloned())
    }

    fn put_raw(&self, bytes: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHash::digest(bytes);
        let mut map = self.blocks.write().map_err(poisoned)?;
        map.entry(hash).or_insert_with(|| bytes.to_vec());
        Ok(hash)
    }
}

impl std::fmt::Debug for InMemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlockStore")
            .field("block_count", &self.len())
            .finish()
    }
}
