//! Read-only audit passes over a pinned block store.
//!
//! Two passes are provided:
//!
//! - **Roots report**: reduce every stored block to the top-level objects
//!   (blocks nothing else links to, plus recursive pins), then classify and
//!   rank them by declared type, pin status and cumulative size.
//! - **Lost pins**: scan every block for stale pinset shards and report the
//!   leaf entries that are no longer in the live pin registry.
//!
//! Both passes honour a [`ScanControl`] and return a [`Scan`] that says
//! whether the result is complete. Per-block failures are logged and skipped;
//! only a failure to open the repository is fatal.
//!
//! # Modules
//!
//! - [`roots`] -- root reduction
//! - [`classify`] -- per-root type, size and ranking
//! - [`lost_pins`] -- pinset recovery walk
//! - [`report`] -- text and JSON rendering
//! - [`auditor`] -- the [`Auditor`] entry point
//! - [`control`] -- cancellation, deadlines and visit caps
//! - [`config`] -- `pinscan.toml` loading

pub mod auditor;
pub mod classify;
pub mod config;
pub mod control;
pub mod error;
pub mod lost_pins;
pub mod report;
pub mod roots;

pub use auditor::Auditor;
pub use classify::{classify, compare, rank, DeclaredType, ObjectInfo};
pub use config::{AuditConfig, CONFIG_FILE};
pub use control::{CancelToken, Scan, ScanControl, StopReason};
pub use error::{AuditError, AuditResult, SetupError};
pub use lost_pins::{find_lost_pins, LostPins, WalkStats};
pub use roots::reduce_roots;
