//! Pin registry views.
//!
//! [`PinSet`] is a point-in-time snapshot of both root sets. The
//! [`PinRegistry`] trait abstracts where that snapshot comes from: tests use
//! [`InMemoryPinRegistry`], the audit tool loads a [`StorePinRegistry`] from
//! a repository on disk.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pinscan_store::{BlockStore, Link, Node};
use pinscan_types::ContentHash;

use crate::error::{PinError, PinResult};
use crate::pinset::{read_pinset, write_pinset, PinSetLayout};

const PINS_DIR: &str = "pins";
const ROOT_FILE: &str = "root";
const RECURSIVE_LINK: &str = "recursive";
const DIRECT_LINK: &str = "direct";

/// Snapshot of the registry's two root sets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSet {
    /// Roots protected together with everything reachable from them.
    pub recursive: BTreeSet<ContentHash>,
    /// Roots protected on their own.
    pub direct: BTreeSet<ContentHash>,
}

impl PinSet {
    pub fn new(recursive: BTreeSet<ContentHash>, direct: BTreeSet<ContentHash>) -> Self {
        Self { recursive, direct }
    }

    /// Whether `hash` is a recursive root.
    pub fn is_recursive(&self, hash: &ContentHash) -> bool {
        self.recursive.contains(hash)
    }

    /// Whether `hash` is pinned either way.
    pub fn is_pinned(&self, hash: &ContentHash) -> bool {
        self.recursive.contains(hash) || self.direct.contains(hash)
    }

    /// Union of recursive and direct roots.
    pub fn pinned(&self) -> BTreeSet<ContentHash> {
        self.recursive.union(&self.direct).copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.recursive.is_empty() && self.direct.is_empty()
    }
}

/// Source of pin root sets.
///
/// Implementations return snapshots; callers never observe a set changing
/// underneath them.
pub trait PinRegistry: Send + Sync {
    /// Roots pinned recursively.
    fn recursive_roots(&self) -> PinResult<BTreeSet<ContentHash>>;

    /// Roots pinned directly.
    fn direct_roots(&self) -> PinResult<BTreeSet<ContentHash>>;

    /// Both sets at once.
    fn snapshot(&self) -> PinResult<PinSet> {
        Ok(PinSet::new(self.recursive_roots()?, self.direct_roots()?))
    }
}

/// An in-memory registry for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryPinRegistry {
    pins: RwLock<PinSet>,
}

impl InMemoryPinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pins(pins: PinSet) -> Self {
        Self {
            pins: RwLock::new(pins),
        }
    }

    pub fn pin_recursive(&self, hash: ContentHash) -> PinResult<()> {
        self.write(|p| {
            p.recursive.insert(hash);
        })
    }

    pub fn pin_direct(&self, hash: ContentHash) -> PinResult<()> {
        self.write(|p| {
            p.direct.insert(hash);
        })
    }

    /// Remove `hash` from both sets. Returns `true` if it was pinned.
    pub fn unpin(&self, hash: &ContentHash) -> PinResult<bool> {
        let mut removed = false;
        self.write(|p| {
            removed = p.recursive.remove(hash) | p.direct.remove(hash);
        })?;
        Ok(removed)
    }

    fn write(&self, f: impl FnOnce(&mut PinSet)) -> PinResult<()> {
        let mut pins = self
            .pins
            .write()
            .map_err(|e| PinError::LockPoisoned(e.to_string()))?;
        f(&mut pins);
        Ok(())
    }

    fn read(&self) -> PinResult<PinSet> {
        let pins = self
            .pins
            .read()
            .map_err(|e| PinError::LockPoisoned(e.to_string()))?;
        Ok(pins.clone())
    }
}

impl PinRegistry for InMemoryPinRegistry {
    fn recursive_roots(&self) -> PinResult<BTreeSet<ContentHash>> {
        Ok(self.read()?.recursive)
    }

    fn direct_roots(&self) -> PinResult<BTreeSet<ContentHash>> {
        Ok(self.read()?.direct)
    }

    fn snapshot(&self) -> PinResult<PinSet> {
        self.read()
    }
}

/// A registry loaded from the pinset trees of a repository.
///
/// `<repo>/pins/root` holds the hex hash of a registry root node whose
/// `"recursive"` and `"direct"` links point at pinset trees. A repository
/// without that file has no pins.
#[derive(Debug, Clone)]
pub struct StorePinRegistry {
    root: Option<ContentHash>,
    pins: PinSet,
}

fn root_file(repo: &Path) -> PathBuf {
    repo.join(PINS_DIR).join(ROOT_FILE)
}

impl StorePinRegistry {
    /// Load the live registry of `repo` from `store`.
    pub fn load<S>(repo: &Path, store: &S) -> PinResult<Self>
    where
        S: BlockStore + ?Sized,
    {
        let text = match fs::read_to_string(root_file(repo)) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(repo = %repo.display(), "no pin root; registry is empty");
                return Ok(Self {
                    root: None,
                    pins: PinSet::default(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        let root = ContentHash::from_hex(&text)?;
        let node = store.fetch_node(&root)?;

        let load = |name: &str| -> PinResult<BTreeSet<ContentHash>> {
            match node.link(name) {
                Some(link) => read_pinset(store, &link.target),
                None => Ok(BTreeSet::new()),
            }
        };
        let pins = PinSet::new(load(RECURSIVE_LINK)?, load(DIRECT_LINK)?);

        info!(
            root = %root.short_hex(),
            recursive = pins.recursive.len(),
            direct = pins.direct.len(),
            "loaded pin registry"
        );
        Ok(Self {
            root: Some(root),
            pins,
        })
    }

    /// Write `pins` into `store` and point `<repo>/pins/root` at them.
    pub fn persist<S>(
        repo: &Path,
        store: &S,
        pins: &PinSet,
        layout: PinSetLayout,
    ) -> PinResult<ContentHash>
    where
        S: BlockStore + ?Sized,
    {
        let recursive = write_pinset(store, &pins.recursive, layout)?;
        let direct = write_pinset(store, &pins.direct, layout)?;
        let node = Node::new(
            Vec::new(),
            vec![
                Link::new(RECURSIVE_LINK, recursive, 0),
                Link::new(DIRECT_LINK, direct, 0),
            ],
        );
        let root = store.put_node(&node)?;

        let path = root_file(repo);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, format!("{root}\n"))?;
        Ok(root)
    }

    /// Hash of the registry root node, if the repository has one.
    pub fn root(&self) -> Option<ContentHash> {
        self.root
    }

    pub fn pins(&self) -> &PinSet {
        &self.pins
    }
}

impl PinRegistry for StorePinRegistry {
    fn recursive_roots(&self) -> PinResult<BTreeSet<ContentHash>> {
        Ok(self.pins.recursive.clone())
    }

    fn direct_roots(&self) -> PinResult<BTreeSet<ContentHash>> {
        Ok(self.pins.direct.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinscan_store::{FsBlockStore, InMemoryBlockStore};

    fn h(seed: u8) -> ContentHash {
        ContentHash::from_hash([seed; 32])
    }

    #[test]
    fn pinned_is_the_union() {
        let pins = PinSet::new([h(1), h(2)].into(), [h(2), h(3)].into());
        assert_eq!(pins.pinned(), BTreeSet::from([h(1), h(2), h(3)]));
        assert!(pins.is_recursive(&h(1)));
        assert!(!pins.is_recursive(&h(3)));
        assert!(pins.is_pinned(&h(3)));
        assert!(!pins.is_pinned(&h(4)));
    }

    #[test]
    fn in_memory_pin_and_unpin() {
        let reg = InMemoryPinRegistry::new();
        reg.pin_recursive(h(1)).unwrap();
        reg.pin_direct(h(2)).unwrap();
        assert_eq!(reg.recursive_roots().unwrap(), BTreeSet::from([h(1)]));
        assert_eq!(reg.direct_roots().unwrap(), BTreeSet::from([h(2)]));
        assert!(reg.unpin(&h(1)).unwrap());
        assert!(!reg.unpin(&h(1)).unwrap());
        assert!(reg.recursive_roots().unwrap().is_empty());
    }

    #[test]
    fn snapshot_does_not_track_later_changes() {
        let reg = InMemoryPinRegistry::new();
        reg.pin_recursive(h(1)).unwrap();
        let snap = reg.snapshot().unwrap();
        reg.pin_recursive(h(2)).unwrap();
        assert_eq!(snap.recursive.len(), 1);
    }

    #[test]
    fn missing_root_file_is_an_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryBlockStore::new();
        let reg = StorePinRegistry::load(dir.path(), &store).unwrap();
        assert!(reg.root().is_none());
        assert!(reg.pins().is_empty());
    }

    #[test]
    fn persist_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlockStore::create(dir.path()).unwrap();
        let pins = PinSet::new((1..=20).map(h).collect(), [h(50)].into());
        let layout = PinSetLayout { fanout: 3, max_items: 4 };
        let root = StorePinRegistry::persist(dir.path(), &store, &pins, layout).unwrap();

        let reg = StorePinRegistry::load(dir.path(), &store).unwrap();
        assert_eq!(reg.root(), Some(root));
        assert_eq!(reg.snapshot().unwrap(), pins);
    }

    #[test]
    fn garbage_root_file_is_invalid_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(PINS_DIR)).unwrap();
        fs::write(root_file(dir.path()), "zz-not-a-hash").unwrap();
        let store = InMemoryBlockStore::new();
        assert!(matches!(
            StorePinRegistry::load(dir.path(), &store),
            Err(PinError::InvalidRoot(_))
        ));
    }

    #[test]
    fn dangling_root_is_a_store_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(PINS_DIR)).unwrap();
        fs::write(root_file(dir.path()), h(9).to_hex()).unwrap();
        let store = InMemoryBlockStore::new();
        assert!(matches!(
            StorePinRegistry::load(dir.path(), &store),
            Err(PinError::Store(_))
        ));
    }
}
