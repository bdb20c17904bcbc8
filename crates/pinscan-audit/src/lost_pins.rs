//! Lost-pin recovery walk.
//!
//! The live registry's pointer to its pinset tree cannot be trusted (it may
//! be exactly what was lost), so every stored block is treated as a possible
//! pinset shard. Each block that decodes as a version-1 shard contributes
//! its leaf entries; entries absent from the live pin sets are reported.
//!
//! This is a heuristic. Any block whose payload happens to decode as a
//! version-1 header is treated as a shard, so false positives are possible
//! and results are candidates for review, not proof of loss.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use pinscan_pin::PinSetNode;
use pinscan_store::{BlockStore, StoreResult};
use pinscan_types::ContentHash;

use crate::control::{Scan, ScanControl, StopReason};

/// Counters describing one walk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    /// Blocks fetched (each at most once).
    pub visited: usize,
    /// Blocks recognised as version-1 pinset shards.
    pub pinset_nodes: usize,
    /// Blocks with a pinset header of another version.
    pub near_misses: usize,
    pub fetch_failures: usize,
}

/// Output of [`find_lost_pins`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LostPins {
    pub missing: BTreeSet<ContentHash>,
    pub stats: WalkStats,
}

/// Scan every stored block for pinset shards and report leaf entries that
/// are not in `pinned`.
pub fn find_lost_pins<S>(
    store: &S,
    pinned: &BTreeSet<ContentHash>,
    ctl: &ScanControl,
) -> StoreResult<Scan<LostPins>>
where
    S: BlockStore + ?Sized,
{
    let universe = store.all_hashes()?;
    info!(blocks = universe.len(), pinned = pinned.len(), "searching for pinset fragments");

    let mut walk = PinsetWalk::new(store, pinned);
    for hash in universe {
        if let Some(reason) = walk.walk_from(hash, ctl) {
            info!(%reason, missing = walk.found.missing.len(), "pinset walk stopped early");
            return Ok(Scan::partial(walk.found, reason));
        }
    }

    info!(
        missing = walk.found.missing.len(),
        shards = walk.found.stats.pinset_nodes,
        "pinset walk complete"
    );
    Ok(Scan::complete(walk.found))
}

struct PinsetWalk<'a, S: ?Sized> {
    store: &'a S,
    pinned: &'a BTreeSet<ContentHash>,
    seen: HashSet<ContentHash>,
    stack: Vec<ContentHash>,
    found: LostPins,
}

impl<'a, S> PinsetWalk<'a, S>
where
    S: BlockStore + ?Sized,
{
    fn new(store: &'a S, pinned: &'a BTreeSet<ContentHash>) -> Self {
        Self {
            store,
            pinned,
            seen: HashSet::new(),
            stack: Vec::new(),
            found: LostPins::default(),
        }
    }

    /// Depth-first walk from `start` through child shards.
    fn walk_from(&mut self, start: ContentHash, ctl: &ScanControl) -> Option<StopReason> {
        self.stack.push(start);
        while let Some(hash) = self.stack.pop() {
            if self.seen.contains(&hash) {
                continue;
            }
            if let Some(reason) = ctl.should_stop(self.found.stats.visited) {
                self.stack.clear();
                return Some(reason);
            }
            self.seen.insert(hash);
            self.visit(hash);
        }
        None
    }

    fn visit(&mut self, hash: ContentHash) {
        self.found.stats.visited += 1;

        let node = match self.store.fetch_node(&hash) {
            Ok(node) => node,
            Err(e) => {
                self.found.stats.fetch_failures += 1;
                warn!(hash = %hash, error = %e, "error reading dag node; skipping");
                return;
            }
        };
        let Some(shard) = PinSetNode::try_decode(&node) else {
            return;
        };
        if !shard.is_genuine() {
            self.found.stats.near_misses += 1;
            debug!(hash = %hash, version = shard.header.version, "pinset header with unexpected version");
            return;
        }

        self.found.stats.pinset_nodes += 1;
        for entry in shard.entries() {
            if !self.pinned.contains(entry) {
                debug!(shard = %hash.short_hex(), entry = %entry, "unpinned pinset entry");
                self.found.missing.insert(*entry);
            }
        }
        self.stack.extend(shard.children().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CancelToken;
    use pinscan_pin::{write_pinset, PinSetHeader, PinSetLayout};
    use pinscan_store::{FsNode, InMemoryBlockStore, Link, Node};

    fn put_shard(
        store: &InMemoryBlockStore,
        version: u32,
        fanout: u32,
        links: &[ContentHash],
    ) -> ContentHash {
        let header = PinSetHeader { version, fanout, seed: 0 };
        let links = links.iter().map(|t| Link::anonymous(*t, 0)).collect();
        store.put_node(&Node::new(header.encode().unwrap(), links)).unwrap()
    }

    fn h(seed: u8) -> ContentHash {
        ContentHash::from_hash([seed; 32])
    }

    fn walk(store: &InMemoryBlockStore, pinned: &BTreeSet<ContentHash>) -> LostPins {
        let scan = find_lost_pins(store, pinned, &ScanControl::unbounded()).unwrap();
        assert!(scan.is_complete());
        scan.value
    }

    #[test]
    fn unpinned_leaf_entry_is_missing() {
        let store = InMemoryBlockStore::new();
        let c1 = put_shard(&store, 1, 0, &[]);
        let c2 = put_shard(&store, 1, 0, &[h(200)]);
        let (kept, lost) = (h(1), h(2));
        put_shard(&store, 1, 2, &[c1, c2, kept, lost]);

        let found = walk(&store, &BTreeSet::from([kept, h(200)]));
        assert_eq!(found.missing, BTreeSet::from([lost]));
        assert_eq!(found.stats.pinset_nodes, 3);
    }

    #[test]
    fn children_are_never_reported_as_entries() {
        let store = InMemoryBlockStore::new();
        let child = put_shard(&store, 1, 0, &[]);
        put_shard(&store, 1, 1, &[child]);
        assert!(walk(&store, &BTreeSet::new()).missing.is_empty());
    }

    #[test]
    fn non_pinset_blocks_contribute_nothing() {
        let store = InMemoryBlockStore::new();
        let file = FsNode::file(b"abc".to_vec()).encode().unwrap();
        store.put_node(&Node::new(file, vec![Link::anonymous(h(3), 1)])).unwrap();
        store.put_node(&Node::new(FsNode::directory().encode().unwrap(), vec![Link::new("x", h(4), 1)])).unwrap();
        store.put_node(&Node::new(b"plain".to_vec(), vec![Link::anonymous(h(5), 1)])).unwrap();
        store.put_raw(&[0xff, 0x00, 0x13]).unwrap();

        let found = walk(&store, &BTreeSet::new());
        assert!(found.missing.is_empty());
        assert_eq!(found.stats.pinset_nodes, 0);
        assert_eq!(found.stats.fetch_failures, 1);
    }

    #[test]
    fn wrong_version_is_a_near_miss_and_not_recursed() {
        let store = InMemoryBlockStore::new();
        let hidden = put_shard(&store, 1, 0, &[h(7)]);
        let v2 = put_shard(&store, 2, 1, &[hidden, h(8)]);
        let found = walk(&store, &BTreeSet::new());
        // the v1 shard is still found by the outer scan, the v2 entry is not
        assert_eq!(found.missing, BTreeSet::from([h(7)]));
        assert_eq!(found.stats.near_misses, 1);
        assert_eq!(store.read_count(&v2), 1);
    }

    #[test]
    fn shared_child_shard_is_visited_once() {
        let store = InMemoryBlockStore::new();
        let shared = put_shard(&store, 1, 0, &[h(9)]);
        let p1 = put_shard(&store, 1, 1, &[shared, h(10)]);
        let p2 = put_shard(&store, 1, 1, &[shared, h(11)]);
        store.reset_reads();

        let found = walk(&store, &BTreeSet::new());
        assert_eq!(store.read_count(&shared), 1);
        assert_eq!(store.read_count(&p1), 1);
        assert_eq!(store.read_count(&p2), 1);
        assert_eq!(found.stats.visited, 3);
        assert_eq!(found.missing, BTreeSet::from([h(9), h(10), h(11)]));
    }

    #[test]
    fn dangling_child_is_a_fetch_failure_not_an_abort() {
        let store = InMemoryBlockStore::new();
        put_shard(&store, 1, 1, &[h(100), h(12)]);
        let found = walk(&store, &BTreeSet::new());
        assert_eq!(found.missing, BTreeSet::from([h(12)]));
        assert_eq!(found.stats.fetch_failures, 1);
    }

    #[test]
    fn superseded_pinset_leaves_its_pins_behind() {
        let store = InMemoryBlockStore::new();
        let layout = PinSetLayout { fanout: 2, max_items: 2 };
        let old: BTreeSet<_> = (1..=6).map(h).collect();
        write_pinset(&store, &old, layout).unwrap();
        let live: BTreeSet<_> = (1..=4).map(h).collect();
        write_pinset(&store, &live, layout).unwrap();

        let found = walk(&store, &live);
        assert_eq!(found.missing, BTreeSet::from([h(5), h(6)]));
    }

    #[test]
    fn walk_is_idempotent() {
        let store = InMemoryBlockStore::new();
        write_pinset(&store, &(1..=9).map(h).collect(), PinSetLayout { fanout: 3, max_items: 2 }).unwrap();
        let pinned = BTreeSet::from([h(1)]);
        assert_eq!(walk(&store, &pinned), walk(&store, &pinned));
    }

    #[test]
    fn visit_cap_yields_labelled_partial_result() {
        let store = InMemoryBlockStore::new();
        for i in 0..5 {
            put_shard(&store, 1, 0, &[h(i)]);
        }
        let ctl = ScanControl::unbounded().with_max_visits(2);
        let scan = find_lost_pins(&store, &BTreeSet::new(), &ctl).unwrap();
        assert_eq!(scan.stopped, Some(StopReason::VisitLimit));
        assert_eq!(scan.value.stats.visited, 2);
        assert_eq!(scan.value.missing.len(), 2);
    }

    #[test]
    fn cancelled_walk_is_partial() {
        let store = InMemoryBlockStore::new();
        put_shard(&store, 1, 0, &[h(1)]);
        let token = CancelToken::new();
        token.cancel();
        let ctl = ScanControl::unbounded().with_cancel(token);
        let scan = find_lost_pins(&store, &BTreeSet::new(), &ctl).unwrap();
        assert_eq!(scan.stopped, Some(StopReason::Cancelled));
        assert!(scan.value.missing.is_empty());
    }
}
