//! Heap file: an append-only sequence of [`BlockId`]-addressed blocks
//! backed by one [`FileBlockStore`], with [`SlottedPage`] views handed out
//! for each block.

use crate::block::{BlockId, BlockStore, FileBlockStore, BLOCK_SZ};
use crate::error::Result;
use crate::page::SlottedPage;
use tracing::debug;

/// Append-only collection of slotted pages, one per [`BlockId`] from
/// [`BlockId::FIRST`] through `last`. Block 0 is reserved and never
/// allocated.
pub struct HeapFile {
    name: String,
    store: FileBlockStore,
    last: u32,
    closed: bool,
}

impl HeapFile {
    /// Construct a heap file named `name`, persisted under `data_dir`. Does
    /// not touch the backing store; call [`HeapFile::create`] or
    /// [`HeapFile::open`] first.
    pub fn new(data_dir: impl AsRef<std::path::Path>, name: &str) -> Self {
        Self {
            name: name.to_string(),
            store: FileBlockStore::new(data_dir, name),
            last: 0,
            closed: true,
        }
    }

    /// Name this heap file was constructed with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create the backing file. Fails with [`crate::error::Error::AlreadyExists`]
    /// if it already exists. Allocates and writes block 1 as an empty
    /// slotted page before returning.
    pub fn create(&mut self) -> Result<()> {
        self.store.open(true)?;
        self.last = 0;
        self.closed = false;
        let (id, page) = self.get_new()?;
        self.put(id, page)?;
        debug!(name = %self.name, "heap file created");
        Ok(())
    }

    /// Open an existing backing file, scanning it to find the last block id.
    pub fn open(&mut self) -> Result<()> {
        if !self.closed {
            return Ok(());
        }
        self.store.open(false)?;
        let len = std::fs::metadata(self.store.path())?.len();
        self.last = (len / BLOCK_SZ as u64) as u32;
        self.closed = false;
        debug!(name = %self.name, last = self.last, "heap file opened");
        Ok(())
    }

    /// Close the backing file. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.store.close()?;
        self.closed = true;
        debug!(name = %self.name, "heap file closed");
        Ok(())
    }

    /// Delete the backing file entirely.
    pub fn drop_file(&mut self) -> Result<()> {
        self.store.remove()?;
        self.closed = true;
        self.last = 0;
        debug!(name = %self.name, "heap file dropped");
        Ok(())
    }

    /// Allocate a new, empty block at the end of the file and return a
    /// fresh page view over it.
    pub fn get_new(&mut self) -> Result<(BlockId, SlottedPage)> {
        self.last += 1;
        let id = BlockId(self.last);
        let zeroed = [0_u8; BLOCK_SZ];
        self.store.put(id, &zeroed)?;
        let page = SlottedPage::new(zeroed, true);
        debug!(name = %self.name, block = %id, "heap file allocated block");
        Ok((id, page))
    }

    /// Read the page stored at `id`.
    pub fn get(&self, id: BlockId) -> Result<SlottedPage> {
        let bytes = self.store.get(id)?;
        Ok(SlottedPage::new(bytes, false))
    }

    /// Write `page`'s bytes back to its block.
    pub fn put(&mut self, id: BlockId, page: SlottedPage) -> Result<()> {
        self.store.put(id, page.as_bytes())?;
        Ok(())
    }

    /// Ascending block ids currently allocated, `1..=last`.
    pub fn block_ids(&self) -> Vec<BlockId> {
        (1..=self.last).map(BlockId).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_allocates_block_one() {
        let dir = tempdir().unwrap();
        let mut heap = HeapFile::new(dir.path(), "widgets");
        heap.create().unwrap();
        assert_eq!(heap.block_ids(), vec![BlockId::FIRST]);

        let id = BlockId::FIRST;
        let mut page = heap.get(id).unwrap();
        page.add(b"row one").unwrap();
        heap.put(id, page).unwrap();

        let page = heap.get(id).unwrap();
        assert_eq!(page.ids(), vec![1]);
        assert_eq!(page.get(1), Some(&b"row one"[..]));
    }

    #[test]
    fn block_ids_grow_monotonically() {
        let dir = tempdir().unwrap();
        let mut heap = HeapFile::new(dir.path(), "widgets");
        heap.create().unwrap();
        for _ in 0..5 {
            heap.get_new().unwrap();
        }
        assert_eq!(
            heap.block_ids(),
            vec![
                BlockId(1),
                BlockId(2),
                BlockId(3),
                BlockId(4),
                BlockId(5),
                BlockId(6),
            ]
        );
    }

    #[test]
    fn create_twice_fails_already_exists() {
        let dir = tempdir().unwrap();
        let mut a = HeapFile::new(dir.path(), "widgets");
        a.create().unwrap();
        let mut b = HeapFile::new(dir.path(), "widgets");
        assert!(matches!(
            b.create(),
            Err(crate::error::Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut heap = HeapFile::new(dir.path(), "widgets");
        heap.create().unwrap();
        heap.close().unwrap();
        heap.close().unwrap();
    }
}
