//! Typed filesystem payloads carried in a node's `data`.
//!
//! A payload is a 4-byte magic followed by the bincode body of an [`FsNode`].
//! [`FsNode::try_decode`] is speculative: classification runs it against
//! every root, and most non-filesystem payloads simply yield `None`.

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::node::block_codec;

const FS_MAGIC: &[u8; 4] = b"UFS1";

/// The kind of a filesystem node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FsKind {
    Raw,
    Directory,
    File,
    Metadata,
    Symlink,
    HamtShard,
}

impl std::fmt::Display for FsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "Raw"),
            Self::Directory => write!(f, "Directory"),
            Self::File => write!(f, "File"),
            Self::Metadata => write!(f, "Metadata"),
            Self::Symlink => write!(f, "Symlink"),
            Self::HamtShard => write!(f, "HAMTShard"),
        }
    }
}

/// A typed filesystem node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsNode {
    pub kind: FsKind,
    /// Inline content (file bytes, symlink target).
    pub data: Vec<u8>,
    /// Logical file size, for files spread across chunk links.
    pub file_size: Option<u64>,
    /// Size of each chunk link, in link order.
    pub block_sizes: Vec<u64>,
}

impl FsNode {
    /// An empty directory payload. Entries live in the node's links.
    pub fn directory() -> Self {
        Self {
            kind: FsKind::Directory,
            data: Vec::new(),
            file_size: None,
            block_sizes: Vec::new(),
        }
    }

    /// A single-chunk file with inline content.
    pub fn file(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            kind: FsKind::File,
            data,
            file_size: Some(len),
            block_sizes: Vec::new(),
        }
    }

    /// Encode as a node payload.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let body = block_codec()
            .serialize(self)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut out = Vec::with_capacity(FS_MAGIC.len() + body.len());
        out.extend_from_slice(FS_MAGIC);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Attempt to interpret a node payload as a filesystem node.
    pub fn try_decode(data: &[u8]) -> Option<Self> {
        let body = data.strip_prefix(FS_MAGIC)?;
        block_codec().deserialize(body).ok()
    }
}
