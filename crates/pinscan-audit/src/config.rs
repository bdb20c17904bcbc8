//! Audit tuning loaded from `<repo>/pinscan.toml`.
//!
//! Every key is optional; a missing file means defaults. Command-line flags
//! override individual keys after loading.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::control::{CancelToken, ScanControl};
use crate::error::SetupError;

/// Name of the optional config file at the repository root.
pub const CONFIG_FILE: &str = "pinscan.toml";

/// Tuning for an audit run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Threads used for the link scan of root reduction. Values below 1
    /// are treated as 1.
    pub workers: usize,
    /// Stop each pass after this many block fetches.
    pub max_visits: Option<usize>,
    /// Stop the run this many seconds after its control is built. One
    /// deadline covers every pass of the run.
    pub deadline_secs: Option<u64>,
    /// Directory entry names listed per directory in the roots report.
    pub directory_preview: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get().min(8))
                .unwrap_or(1),
            max_visits: None,
            deadline_secs: None,
            directory_preview: 5,
        }
    }
}

impl AuditConfig {
    /// Load `<repo>/pinscan.toml`, falling back to defaults when absent.
    pub fn load(repo: &Path) -> Result<Self, SetupError> {
        let path = repo.join(CONFIG_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(SetupError::Config {
                    path,
                    reason: e.to_string(),
                })
            }
        };
        Self::from_toml(&text).map_err(|reason| SetupError::Config { path, reason })
    }

    /// Parse a config document.
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }

    /// Build the stop conditions for a run. The deadline clock starts now and
    /// is shared by every pass given this control.
    pub fn control(&self, cancel: CancelToken) -> ScanControl {
        let mut ctl = ScanControl::unbounded().with_cancel(cancel);
        if let Some(secs) = self.deadline_secs {
            ctl = ctl.with_timeout(Duration::from_secs(secs));
        }
        if let Some(max) = self.max_visits {
            ctl = ctl.with_max_visits(max);
        }
        ctl
    }
}
