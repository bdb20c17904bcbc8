//! Foundation types for pinscan.
//!
//! Every block in the audited store is identified by a [`ContentHash`]: the
//! BLAKE3 digest of its encoded bytes. Equality of two hashes implies equality
//! of the underlying content, so hashes are used directly as set members
//! throughout the audit passes.

pub mod error;
pub mod hash;

pub use error::TypeError;
pub use hash::ContentHash;
