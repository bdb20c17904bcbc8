use std::path::PathBuf;

use pinscan_types::ContentHash;

/// Errors from block store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested block is not in the store.
    #[error("block not found: {0}")]
    NotFound(ContentHash),

    /// The block bytes do not hash to the key they are stored under.
    #[error("hash mismatch for {hash}: stored bytes digest to {computed}")]
    HashMismatch {
        hash: ContentHash,
        computed: ContentHash,
    },

    /// The block exists but does not decode as a DAG node.
    #[error("corrupt block {hash}: {reason}")]
    CorruptBlock { hash: ContentHash, reason: String },

    /// The aggregate size of a node does not fit in a `u64`.
    #[error("size overflow while summing links of {0}")]
    SizeOverflow(ContentHash),

    /// The repository directory (or its block directory) does not exist.
    #[error("no block repository at {}", .0.display())]
    RepoNotFound(PathBuf),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding in-memory state was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
