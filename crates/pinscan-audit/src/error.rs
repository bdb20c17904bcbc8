//! Error types for the audit passes.
//!
//! Only [`SetupError`] is fatal to a run. Per-block failures inside a pass
//! are logged and skipped and never surface here.

use std::path::PathBuf;

use pinscan_pin::PinError;
use pinscan_store::StoreError;

/// Failure to open the repository an audit runs against.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The block store could not be located or opened.
    #[error("cannot open block store at {}: {source}", path.display())]
    OpenStore {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    /// The live pin registry could not be loaded.
    #[error("cannot load pin registry: {0}")]
    LoadPins(#[source] PinError),

    /// The repository's audit config file is unreadable or invalid.
    #[error("invalid config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

/// Errors that can abort an audit.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),

    /// Failure of a store-wide operation such as enumeration.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("pin registry error: {0}")]
    Pin(#[from] PinError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for audit results.
pub type AuditResult<T> = Result<T, AuditError>;
