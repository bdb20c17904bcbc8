//! Sharded pinset encoding.
//!
//! A pinset node is an ordinary DAG [`Node`] whose `data` starts with a
//! varint length prefix followed by the bincode encoding of a
//! [`PinSetHeader`]. The first `min(fanout, links.len())` links point at
//! child shards; links at index `fanout` and beyond are leaf entries, each
//! naming one pinned hash.
//!
//! Small sets are written as a single leaf shard (`fanout == 0`). Larger sets
//! are split into `fanout` buckets keyed by `blake3(seed || hash)`, where the
//! seed is the shard depth, and each bucket is written recursively.

use std::collections::{BTreeSet, HashSet};

use bincode::Options;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pinscan_store::{block_codec, BlockStore, Link, Node};
use pinscan_types::ContentHash;

use crate::error::{PinError, PinResult};

/// The only header version produced and recognised.
pub const PINSET_VERSION: u32 = 1;
/// Child buckets per internal shard.
pub const DEFAULT_FANOUT: u32 = 256;
/// Pins a single leaf shard may hold before the set is split.
pub const DEFAULT_MAX_ITEMS: usize = 8192;

/// Hard stop on shard depth. A bucket that still overflows here is written as
/// an oversized leaf instead of being split again.
const MAX_DEPTH: u32 = 8;
/// Bound on the header length prefix; real headers are 12 bytes.
const MAX_HEADER_LEN: u64 = 64;

/// Header stored at the front of every pinset node's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSetHeader {
    pub version: u32,
    /// Number of leading links that point at child shards.
    pub fanout: u32,
    /// Bucket selection seed for this shard's children.
    pub seed: u32,
}

impl PinSetHeader {
    /// Encode as a length-prefixed payload prefix.
    pub fn encode(&self) -> PinResult<Vec<u8>> {
        let body = block_codec()
            .serialize(self)
            .map_err(|e| PinError::Serialization(e.to_string()))?;
        let mut out = Vec::with_capacity(body.len() + 1);
        encode_varint(&mut out, body.len() as u64);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Attempt to decode a header from the front of a payload.
    ///
    /// Returns `None` on any mismatch: bad varint, short payload, or a body
    /// that is not exactly one header. Bytes after the header are ignored.
    pub fn try_decode(data: &[u8]) -> Option<Self> {
        let (len, consumed) = decode_varint(data)?;
        if len > MAX_HEADER_LEN {
            return None;
        }
        let body = data.get(consumed..consumed + len as usize)?;
        block_codec().deserialize(body).ok()
    }
}

/// A node successfully decoded as a pinset shard.
#[derive(Clone, Copy, Debug)]
pub struct PinSetNode<'a> {
    pub header: PinSetHeader,
    pub links: &'a [Link],
}

impl<'a> PinSetNode<'a> {
    /// Attempt to view a DAG node as a pinset shard.
    ///
    /// Any version decodes here; callers check [`is_genuine`](Self::is_genuine).
    pub fn try_decode(node: &'a Node) -> Option<Self> {
        let header = PinSetHeader::try_decode(&node.data)?;
        Some(Self {
            header,
            links: &node.links,
        })
    }

    /// Whether the header carries the recognised version.
    pub fn is_genuine(&self) -> bool {
        self.header.version == PINSET_VERSION
    }

    /// Number of links that are child shards.
    pub fn child_count(&self) -> usize {
        (self.header.fanout as usize).min(self.links.len())
    }

    /// Child shard hashes, in link order.
    pub fn children(&self) -> impl Iterator<Item = &'a ContentHash> {
        let links: &'a [Link] = self.links;
        links[..self.child_count()].iter().map(|l| &l.target)
    }

    /// Pinned hashes recorded directly in this shard.
    pub fn entries(&self) -> impl Iterator<Item = &'a ContentHash> {
        let links: &'a [Link] = self.links;
        links[self.child_count()..].iter().map(|l| &l.target)
    }
}

/// Shape parameters for [`write_pinset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinSetLayout {
    pub fanout: u32,
    pub max_items: usize,
}

impl Default for PinSetLayout {
    fn default() -> Self {
        Self {
            fanout: DEFAULT_FANOUT,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

/// Write `pins` as a pinset tree and return the root shard's hash.
pub fn write_pinset<S>(
    store: &S,
    pins: &BTreeSet<ContentHash>,
    layout: PinSetLayout,
) -> PinResult<ContentHash>
where
    S: BlockStore + ?Sized,
{
    let pins: Vec<ContentHash> = pins.iter().copied().collect();
    let (root, size) = write_shard(store, &pins, 0, layout)?;
    debug!(root = %root.short_hex(), pins = pins.len(), size, "wrote pinset");
    Ok(root)
}

fn write_shard<S>(
    store: &S,
    pins: &[ContentHash],
    depth: u32,
    layout: PinSetLayout,
) -> PinResult<(ContentHash, u64)>
where
    S: BlockStore + ?Sized,
{
    let split = pins.len() > layout.max_items && layout.fanout > 0 && depth < MAX_DEPTH;

    let (fanout, links) = if split {
        let mut buckets = vec![Vec::new(); layout.fanout as usize];
        for pin in pins {
            buckets[bucket_of(depth, pin, layout.fanout)].push(*pin);
        }
        let mut links = Vec::with_capacity(buckets.len());
        for bucket in &buckets {
            let (child, size) = write_shard(store, bucket, depth + 1, layout)?;
            links.push(Link::anonymous(child, size));
        }
        (layout.fanout, links)
    } else {
        (0, pins.iter().map(|p| Link::anonymous(*p, 0)).collect())
    };

    let header = PinSetHeader {
        version: PINSET_VERSION,
        fanout,
        seed: depth,
    };
    let node = Node::new(header.encode()?, links);
    let size = node.total_size()?;
    Ok((store.put_node(&node)?, size))
}

fn bucket_of(seed: u32, pin: &ContentHash, fanout: u32) -> usize {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(pin.as_bytes());
    let digest = hasher.finalize();
    let mut word = [0u8; 4];
    word.copy_from_slice(&digest.as_bytes()[..4]);
    (u32::from_le_bytes(word) % fanout) as usize
}

/// Read every pinned hash recorded in the live pinset tree rooted at `root`.
///
/// Unlike the audit walk, a live tree must be well formed: a node that is not
/// a version-1 shard is an error.
pub fn read_pinset<S>(store: &S, root: &ContentHash) -> PinResult<BTreeSet<ContentHash>>
where
    S: BlockStore + ?Sized,
{
    let mut pins = BTreeSet::new();
    let mut seen = HashSet::new();
    let mut stack = vec![*root];

    while let Some(hash) = stack.pop() {
        if !seen.insert(hash) {
            continue;
        }
        let node = store.fetch_node(&hash)?;
        let shard = PinSetNode::try_decode(&node).ok_or_else(|| PinError::MalformedPinSet {
            hash,
            reason: "payload has no pinset header".into(),
        })?;
        if !shard.is_genuine() {
            return Err(PinError::MalformedPinSet {
                hash,
                reason: format!("unsupported pinset version {}", shard.header.version),
            });
        }
        pins.extend(shard.entries().copied());
        stack.extend(shard.children().copied());
    }

    Ok(pins)
}

fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Returns (value, bytes_consumed), or `None` if truncated or too long.
fn decode_varint(data: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        if shift >= 64 {
            return None;
        }
    }
    None
}
