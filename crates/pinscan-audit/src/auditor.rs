//! The [`Auditor`] ties a block store, a pin registry and a config together
//! and runs the two audit passes over them.

use std::path::Path;

use tracing::{info, instrument};

use pinscan_pin::{PinRegistry, StorePinRegistry};
use pinscan_store::{BlockStore, FsBlockStore};

use crate::classify::{classify, ObjectInfo};
use crate::config::AuditConfig;
use crate::control::{CancelToken, Scan, ScanControl};
use crate::error::{AuditResult, SetupError};
use crate::lost_pins::{find_lost_pins, LostPins};
use crate::roots::reduce_roots;

/// Read-only audit over a store and its pins.
pub struct Auditor<S, R> {
    store: S,
    registry: R,
    config: AuditConfig,
}

impl Auditor<FsBlockStore, StorePinRegistry> {
    /// Open the repository at `repo` for auditing.
    ///
    /// Fails if the block store is missing, the config file is invalid or
    /// the live pin registry cannot be read.
    pub fn open(repo: &Path) -> Result<Self, SetupError> {
        let store = FsBlockStore::open(repo).map_err(|source| SetupError::OpenStore {
            path: repo.to_path_buf(),
            source,
        })?;
        let config = AuditConfig::load(repo)?;
        let registry = StorePinRegistry::load(repo, &store).map_err(SetupError::LoadPins)?;
        Ok(Self::new(store, registry, config))
    }
}

impl<S, R> Auditor<S, R>
where
    S: BlockStore,
    R: PinRegistry,
{
    pub fn new(store: S, registry: R, config: AuditConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AuditConfig {
        &mut self.config
    }

    /// Build the scan limits for one pass from the current config.
    pub fn control(&self, cancel: CancelToken) -> ScanControl {
        self.config.control(cancel)
    }

    /// Find every top-level object and rank it for the roots report.
    ///
    /// If the reduction stops early, every root it accumulated is still
    /// reported. Roots that classification could not reach are kept as
    /// unclassified rows and the result is marked partial.
    #[instrument(skip_all)]
    pub fn roots_report(&self, ctl: &ScanControl) -> AuditResult<Scan<Vec<ObjectInfo>>> {
        let recursive = self.registry.recursive_roots()?;
        let roots = reduce_roots(
            &self.store,
            &recursive,
            ctl,
            self.config.effective_workers(),
        )?;
        info!(roots = roots.value.len(), complete = roots.is_complete(), "root reduction done");

        let classified = classify(&self.store, &roots.value, &recursive, ctl);
        Ok(Scan {
            value: classified.value,
            stopped: roots.stopped.or(classified.stopped),
        })
    }

    /// Find pinned hashes recorded in stale pinset shards but absent from
    /// the live registry.
    #[instrument(skip_all)]
    pub fn lost_pins(&self, ctl: &ScanControl) -> AuditResult<Scan<LostPins>> {
        let pinned = self.registry.snapshot()?.pinned();
        let found = find_lost_pins(&self.store, &pinned, ctl)?;
        info!(
            missing = found.value.missing.len(),
            visited = found.value.stats.visited,
            complete = found.is_complete(),
            "lost pin search done"
        );
        Ok(found)
    }
}
