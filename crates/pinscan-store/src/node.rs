//! Merkle-DAG node and its block codec.
//!
//! A [`Node`] is the parsed form of a block: an opaque `data` payload and an
//! ordered list of named [`Link`]s. The block bytes are the bincode encoding
//! of the node (fixed-width integers, trailing bytes rejected), and the
//! block's [`ContentHash`] is the digest of those bytes.

use bincode::Options;
use serde::{Deserialize, Serialize};

use pinscan_types::ContentHash;

use crate::error::{StoreError, StoreResult};

/// Upper bound on a single encoded block. Decoding stops at this limit so a
/// bogus length prefix can never trigger a huge allocation.
pub const MAX_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// The bincode configuration shared by every on-disk structure.
pub fn block_codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
        .with_limit(MAX_BLOCK_SIZE)
}

/// A named edge from one node to another block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Link name (a directory entry name, or empty for anonymous links).
    pub name: String,
    /// Hash of the linked block.
    pub target: ContentHash,
    /// Approximate aggregate size of the linked subgraph.
    pub size: u64,
}

impl Link {
    /// Create a new link.
    pub fn new(name: impl Into<String>, target: ContentHash, size: u64) -> Self {
        Self {
            name: name.into(),
            target,
            size,
        }
    }

    /// An anonymous link, as used by pinset shards and file chunks.
    pub fn anonymous(target: ContentHash, size: u64) -> Self {
        Self::new("", target, size)
    }
}

/// The parsed form of a block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Raw payload bytes.
    pub data: Vec<u8>,
    /// Ordered links to other blocks.
    pub links: Vec<Link>,
}

impl Node {
    /// Create a node from payload and links.
    pub fn new(data: Vec<u8>, links: Vec<Link>) -> Self {
        Self { data, links }
    }

    /// Encode into block bytes.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        block_codec()
            .serialize(self)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode block bytes.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        block_codec()
            .deserialize(bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Content hash of the encoded node.
    pub fn hash(&self) -> StoreResult<ContentHash> {
        Ok(ContentHash::digest(&self.encode()?))
    }

    /// Aggregate size: the encoded length of this node plus the declared size
    /// of every linked subgraph.
    pub fn total_size(&self) -> StoreResult<u64> {
        let encoded = self.encode()?;
        let own = encoded.len() as u64;
        self.links
            .iter()
            .try_fold(own, |acc, link| acc.checked_add(link.size))
            .ok_or_else(|| StoreError::SizeOverflow(ContentHash::digest(&encoded)))
    }

    /// Hashes of all linked blocks, in link order.
    pub fn link_targets(&self) -> impl Iterator<Item = &ContentHash> {
        self.links.iter().map(|l| &l.target)
    }

    /// Find a link by name.
    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }
}
