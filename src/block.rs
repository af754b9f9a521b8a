//! Durable mapping from a [`BlockId`] to a fixed-size opaque byte block.
//!
//! This is the one external collaborator the rest of the engine is built
//! on: a record-oriented store that durably maps a 32-bit block id to a
//! `BLOCK_SZ`-byte block. [`FileBlockStore`] is the one implementation
//! shipped here, backed by a single `std::fs::File`, in the same style as
//! the teacher crate's `SimpleFileStorage` (seek + read/write, no internal
//! buffering of its own).

use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Size in bytes of every block. Fixed at compile time: §3 of the spec
/// this engine implements requires `BLOCK_SZ` to be an implementation
/// constant, not a runtime parameter.
pub const BLOCK_SZ: usize = 4096;

/// 1-based, monotonically assigned block identifier. Block 0 is reserved
/// and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    /// The first valid block id.
    pub const FIRST: BlockId = BlockId(1);

    fn offset(self) -> u64 {
        (self.0 as u64 - 1) * BLOCK_SZ as u64
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable key/value store of fixed-size blocks, keyed by [`BlockId`].
///
/// Flags mirror the handful of open modes a heap file needs: exclusive
/// creation (fails if the backing file already exists) and ordinary open.
pub trait BlockStore {
    /// Open the backing store. `exclusive` requests creation, failing with
    /// [`Error::AlreadyExists`] if the store is already present.
    fn open(&mut self, exclusive: bool) -> Result<()>;

    /// Close the backing store. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Write `block` under `key`, creating the slot if it is new.
    fn put(&mut self, key: BlockId, block: &[u8; BLOCK_SZ]) -> Result<()>;

    /// Read the block stored under `key`.
    fn get(&self, key: BlockId) -> Result<[u8; BLOCK_SZ]>;

    /// Remove the backing store entirely (used by `drop`).
    fn remove(&mut self) -> Result<()>;
}

/// [`BlockStore`] backed by a single flat file, one `BLOCK_SZ` record per
/// [`BlockId`], addressed by seeking to `(id - 1) * BLOCK_SZ`.
pub struct FileBlockStore {
    path: PathBuf,
    file: Option<File>,
}

impl FileBlockStore {
    /// Construct a store for the relation named `name`, persisted at
    /// `<data_dir>/<name>.db` per §6's "Persisted state".
    pub fn new(data_dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: data_dir.as_ref().join(format!("{name}.db")),
            file: None,
        }
    }

    fn file_mut(&mut self) -> &mut File {
        self.file.as_mut().expect("block store not open")
    }

    /// Path of the backing file, for callers that need to stat it directly
    /// (e.g. a heap file scanning for its last block on open).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockStore for FileBlockStore {
    fn open(&mut self, exclusive: bool) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let mut opts = OpenOptions::new();
        opts.read(true).write(true);
        if exclusive {
            opts.create_new(true);
        } else {
            opts.create(true);
        }
        let file = opts.open(&self.path).map_err(|e| {
            if exclusive && e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::AlreadyExists(
                    self.path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string(),
                )
            } else {
                Error::Io(e)
            }
        })?;
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }

    fn put(&mut self, key: BlockId, block: &[u8; BLOCK_SZ]) -> Result<()> {
        let off = key.offset();
        let f = self.file_mut();
        f.seek(SeekFrom::Start(off))?;
        f.write_all(block)?;
        Ok(())
    }

    fn get(&self, key: BlockId) -> Result<[u8; BLOCK_SZ]> {
        let off = key.offset();
        // `&File` implements Read + Seek in std, so no `&mut self` is needed.
        let mut f = self.file.as_ref().expect("block store not open");
        let mut buf = [0_u8; BLOCK_SZ];
        f.seek(SeekFrom::Start(off))?;
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn remove(&mut self) -> Result<()> {
        self.close()?;
        fs::remove_file(&self.path)?;
        Ok(())
    }
}
