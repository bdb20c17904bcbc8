//! Error types for pin registry operations.

use thiserror::Error;

use pinscan_store::StoreError;
use pinscan_types::{ContentHash, TypeError};

/// Errors that can occur while loading or persisting pins.
#[derive(Debug, Error)]
pub enum PinError {
    /// The registry root pointer file does not hold a valid hash.
    #[error("invalid pin root pointer: {0}")]
    InvalidRoot(#[from] TypeError),

    /// A node in the live pinset tree is not a valid pinset shard.
    #[error("malformed pinset node {hash}: {reason}")]
    MalformedPinSet { hash: ContentHash, reason: String },

    /// Failure reading or writing blocks.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding in-memory state was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error on the root pointer file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for pin operations.
pub type PinResult<T> = std::result::Result<T, PinError>;
