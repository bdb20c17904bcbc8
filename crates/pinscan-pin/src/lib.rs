//! Pin registry for pinscan.
//!
//! Pins are the durable "do not collect" root set of a block store.
//! *Recursive* pins protect a hash and everything reachable from it; *direct*
//! pins protect only the named hash.
//!
//! # Persistence
//!
//! The registry is persisted inside the block store itself. A registry root
//! node carries two named links, `"recursive"` and `"direct"`, each pointing
//! at a pinset tree. Large sets are sharded: every pinset node starts with a
//! [`PinSetHeader`] whose `fanout` says how many leading links are child
//! shards; any remaining links are the pinned hashes themselves.
//!
//! # Modules
//!
//! - [`pinset`] -- shard header codec, speculative decode, tree writer/reader
//! - [`registry`] -- [`PinSet`] snapshots and the [`PinRegistry`] trait
//! - [`error`] -- error types for pin operations

pub mod error;
pub mod pinset;
pub mod registry;

pub use error::{PinError, PinResult};
pub use pinset::{
    read_pinset, write_pinset, PinSetHeader, PinSetLayout, PinSetNode, DEFAULT_FANOUT,
    DEFAULT_MAX_ITEMS, PINSET_VERSION,
};
pub use registry::{InMemoryPinRegistry, PinRegistry, PinSet, StorePinRegistry};
