//! Classification and ranking of top-level objects.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};
use tracing::{info, warn};

use pinscan_store::{BlockStore, FsKind, FsNode};
use pinscan_types::ContentHash;

use crate::control::{Scan, ScanControl};

/// What a root's payload declares itself to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    /// The payload is not a filesystem node.
    Unknown,
    UnixFs(FsKind),
    /// The scan stopped before this root was fetched.
    Unclassified,
}

impl DeclaredType {
    /// Classify a node payload by attempting a filesystem-node decode.
    pub fn of(data: &[u8]) -> Self {
        match FsNode::try_decode(data) {
            Some(fs) => Self::UnixFs(fs.kind),
            None => Self::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::UnixFs(FsKind::Directory))
    }

    /// Sort class: filesystem types, then `unknown`, then `unclassified`.
    fn rank_class(&self) -> u8 {
        match self {
            Self::UnixFs(_) => 0,
            Self::Unknown => 1,
            Self::Unclassified => 2,
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::UnixFs(kind) => write!(f, "unixfs-{kind}"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

impl Serialize for DeclaredType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn as_hex<S: Serializer>(hash: &ContentHash, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(hash)
}

/// One row of the roots report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    #[serde(serialize_with = "as_hex")]
    pub hash: ContentHash,
    #[serde(rename = "type")]
    pub declared_type: DeclaredType,
    pub total_size: u64,
    /// Whether the object is a recursive pin.
    pub pinned: bool,
}

/// Build a report row for every root and rank them.
///
/// A root whose node cannot be fetched is logged and left out. A root whose
/// size cannot be computed is reported with size zero. If `ctl` stops the
/// pass, the roots not yet fetched are kept as
/// [`DeclaredType::Unclassified`] rows with size zero.
pub fn classify<S>(
    store: &S,
    roots: &BTreeSet<ContentHash>,
    recursive: &BTreeSet<ContentHash>,
    ctl: &ScanControl,
) -> Scan<Vec<ObjectInfo>>
where
    S: BlockStore + ?Sized,
{
    let mut infos = Vec::with_capacity(roots.len());
    let mut stopped = None;

    for (visited, hash) in roots.iter().enumerate() {
        if let Some(stop) = ctl.should_stop(visited) {
            stopped = Some(stop);
            infos.extend(roots.iter().skip(visited).map(|h| ObjectInfo {
                hash: *h,
                declared_type: DeclaredType::Unclassified,
                total_size: 0,
                pinned: recursive.contains(h),
            }));
            break;
        }
        let node = match store.fetch_node(hash) {
            Ok(node) => node,
            Err(e) => {
                warn!(hash = %hash, error = %e, "error reading dag node; skipping");
                continue;
            }
        };
        let total_size = node.total_size().unwrap_or_else(|e| {
            warn!(hash = %hash, error = %e, "error getting size of object");
            0
        });
        infos.push(ObjectInfo {
            hash: *hash,
            declared_type: DeclaredType::of(&node.data),
            total_size,
            pinned: recursive.contains(hash),
        });
    }

    rank(&mut infos);
    info!(objects = infos.len(), "classification complete");
    match stopped {
        Some(reason) => Scan::partial(infos, reason),
        None => Scan::complete(infos),
    }
}

/// Report order: known types before `unknown` before `unclassified`, then
/// pinned before unpinned, then larger before smaller. Equal rows fall back
/// to hash order so the ranking is a total order.
pub fn compare(a: &ObjectInfo, b: &ObjectInfo) -> Ordering {
    a.declared_type
        .rank_class()
        .cmp(&b.declared_type.rank_class())
        .then_with(|| b.pinned.cmp(&a.pinned))
        .then_with(|| b.total_size.cmp(&a.total_size))
        .then_with(|| a.hash.cmp(&b.hash))
}

/// Sort rows into report order.
pub fn rank(infos: &mut [ObjectInfo]) {
    infos.sort_by(compare);
}
