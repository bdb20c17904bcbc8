//! Root reduction: collapse the block universe to its top-level objects.
//!
//! A hash survives iff no block in the universe links to it, or it is itself
//! a recursive pin. The universe is frozen into a `Vec` before any fetch and
//! the link scan only ever reads that frozen sequence; removals go to a
//! separate candidate set, so the result does not depend on scan order.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tracing::{info, warn};

use pinscan_store::{BlockStore, StoreResult};
use pinscan_types::ContentHash;

use crate::control::{Scan, ScanControl, StopReason};

/// Reduce every stored hash to the set of top-level objects.
///
/// With `workers > 1` the link scan is split across scoped threads. Each
/// worker owns the target set it builds; the sets are merged here once all
/// workers have joined.
pub fn reduce_roots<S>(
    store: &S,
    recursive: &BTreeSet<ContentHash>,
    ctl: &ScanControl,
    workers: usize,
) -> StoreResult<Scan<BTreeSet<ContentHash>>>
where
    S: BlockStore + ?Sized,
{
    let universe = store.all_hashes()?;
    info!(blocks = universe.len(), "key gathering complete, finding graph roots");

    let mut roots: BTreeSet<ContentHash> = universe.iter().copied().collect();

    let workers = workers.max(1);
    let visited = AtomicUsize::new(0);
    let partials: Vec<LinkScan> = if workers == 1 || universe.len() < 2 {
        vec![scan_links(store, &universe, recursive, ctl, &visited)]
    } else {
        let chunk = universe.len().div_ceil(workers);
        let visited = &visited;
        thread::scope(|s| {
            let handles: Vec<_> = universe
                .chunks(chunk)
                .map(|part| s.spawn(move || scan_links(store, part, recursive, ctl, visited)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    };

    let mut stopped = None;
    for LinkScan { targets, stop } in partials {
        for target in &targets {
            roots.remove(target);
        }
        stopped = stopped.or(stop);
    }

    info!(roots = roots.len(), complete = stopped.is_none(), "root selection complete");
    Ok(match stopped {
        Some(reason) => Scan::partial(roots, reason),
        None => Scan::complete(roots),
    })
}

struct LinkScan {
    targets: HashSet<ContentHash>,
    stop: Option<StopReason>,
}

/// Collect every non-recursively-pinned link target of the given blocks.
/// `visited` is shared by all workers so a visit cap bounds the whole pass.
fn scan_links<S>(
    store: &S,
    hashes: &[ContentHash],
    recursive: &BTreeSet<ContentHash>,
    ctl: &ScanControl,
    visited: &AtomicUsize,
) -> LinkScan
where
    S: BlockStore + ?Sized,
{
    let mut targets = HashSet::new();
    for hash in hashes {
        if let Some(stop) = ctl.should_stop(visited.fetch_add(1, Ordering::Relaxed)) {
            return LinkScan {
                targets,
                stop: Some(stop),
            };
        }
        match store.fetch_node(hash) {
            Ok(node) => {
                targets.extend(node.link_targets().filter(|t| !recursive.contains(t)));
            }
            Err(e) => warn!(hash = %hash, error = %e, "error reading dag node; skipping"),
        }
    }
    LinkScan {
        targets,
        stop: None,
    }
}
