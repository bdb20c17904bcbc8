//! Content-addressed block storage for pinscan.
//!
//! A block is an immutable byte string keyed by the BLAKE3 digest of those
//! bytes. Most blocks decode as a merkle-DAG [`Node`]: an opaque payload plus
//! an ordered list of named [`Link`]s to other blocks. Some payloads further
//! decode as a typed filesystem node ([`FsNode`]).
//!
//! # Storage Backends
//!
//! All backends implement the [`BlockStore`] trait:
//!
//! - [`InMemoryBlockStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsBlockStore`] -- one file per block under `<repo>/blocks/`
//!
//! # Design Rules
//!
//! 1. Blocks are immutable once written (content-addressing guarantees this).
//! 2. Enumeration returns a snapshot; later writes are not reflected in it.
//! 3. Speculative decodes (`try_decode`) never error, they return `None`.
//! 4. Decode failures of a single block never poison the rest of the store.

pub mod error;
pub mod fs;
pub mod memory;
pub mod node;
pub mod traits;
pub mod unixfs;

pub use error::{StoreError, StoreResult};
pub use fs::FsBlockStore;
pub use memory::InMemoryBlockStore;
pub use node::{block_codec, Link, Node, MAX_BLOCK_SIZE};
pub use traits::BlockStore;
pub use unixfs::{FsKind, FsNode};
