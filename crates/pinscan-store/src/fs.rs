//! On-disk block repository.
//!
//! Layout: `<repo>/blocks/<first two hex chars>/<full hex>.blk`. Each file
//! holds the raw block bytes; the file name is the digest of those bytes.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use pinscan_types::ContentHash;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

const BLOCKS_DIR: &str = "blocks";
const BLOCK_EXT: &str = "blk";

/// A block store backed by one file per block.
#[derive(Debug, Clone)]
pub struct FsBlockStore {
    blocks: PathBuf,
}

impl FsBlockStore {
    /// Open an existing repository.
    ///
    /// Fails with [`StoreError::RepoNotFound`] if `repo` or its block
    /// directory is missing.
    pub fn open(repo: &Path) -> StoreResult<Self> {
        let blocks = repo.join(BLOCKS_DIR);
        if !blocks.is_dir() {
            return Err(StoreError::RepoNotFound(repo.to_path_buf()));
        }
        debug!(path = %blocks.display(), "opened block repository");
        Ok(Self { blocks })
    }

    /// Create the repository layout if needed, then open it.
    pub fn create(repo: &Path) -> StoreResult<Self> {
        fs::create_dir_all(repo.join(BLOCKS_DIR))?;
        Self::open(repo)
    }

    fn shard_dir(&self, hex: &str) -> PathBuf {
        self.blocks.join(&hex[..2])
    }

    fn block_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.shard_dir(&hex).join(format!("{hex}.{BLOCK_EXT}"))
    }
}

fn parse_block_file(path: &Path) -> Option<ContentHash> {
    if path.extension()? != BLOCK_EXT {
        return None;
    }
    ContentHash::from_hex(path.file_stem()?.to_str()?).ok()
}

impl BlockStore for FsBlockStore {
    fn all_hashes(&self) -> StoreResult<Vec<ContentHash>> {
        let mut hashes = Vec::new();
        for shard in fs::read_dir(&self.blocks)? {
            let shard = shard?.path();
            if !shard.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&shard)? {
                let path = entry?.path();
                match parse_block_file(&path) {
                    Some(hash) => hashes.push(hash),
                    None => debug!(path = %path.display(), "ignoring non-block file"),
                }
            }
        }
        Ok(hashes)
    }

    fn get_raw(&self, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>> {
        let bytes = match fs::read(self.block_path(hash)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let computed = ContentHash::digest(&bytes);
        if computed != *hash {
            warn!(hash = %hash, computed = %computed, "block content does not match its name");
            return Err(StoreError::HashMismatch {
                hash: *hash,
                computed,
            });
        }
        Ok(Some(bytes))
    }

    fn put_raw(&self, bytes: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHash::digest(bytes);
        let path = self.block_path(&hash);
        if path.exists() {
            return Ok(hash);
        }
        let dir = self.shard_dir(&hash.to_hex());
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(hash)
    }
}
