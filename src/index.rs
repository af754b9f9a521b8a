//! Backing storage for one named index, constructed by `CREATE INDEX`
//! after its `_indices` catalog rows are recorded (spec.md §4.F step 3:
//! "Construct the index and call `create`").
//!
//! This engine's scope excludes query planning and selection (spec.md §1's
//! Non-goals), so an `Index` carries no lookup structure of its own — it is
//! a named backing file whose lifecycle mirrors [`HeapRelation`]'s, giving
//! `CREATE INDEX`/a future `DROP INDEX` something concrete to allocate and
//! remove.

use crate::error::{Error, Result};
use crate::heap::HeapFile;
use tracing::debug;

/// One index's backing file, named `<table>_<index_name>` on disk. `BTREE`
/// (unique) vs. `HASH` (non-unique) is recorded per-column in `_indices`;
/// this type only manages the file the index occupies.
pub struct Index {
    table: String,
    index_name: String,
    heap: HeapFile,
}

impl Index {
    /// Construct an index view over `table`.`index_name`. Does not touch
    /// the backing file; call [`Index::create`] or
    /// [`Index::create_if_not_exists`] first.
    pub fn new(data_dir: impl AsRef<std::path::Path>, table: &str, index_name: &str) -> Self {
        let file_name = format!("{table}_{index_name}");
        Self {
            table: table.to_string(),
            index_name: index_name.to_string(),
            heap: HeapFile::new(data_dir, &file_name),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Create the backing file. Fails with [`Error::AlreadyExists`] if it
    /// already exists.
    pub fn create(&mut self) -> Result<()> {
        self.heap.create()?;
        debug!(table = %self.table, index = %self.index_name, "index created");
        Ok(())
    }

    /// Create the backing file if it does not already exist.
    pub fn create_if_not_exists(&mut self) -> Result<()> {
        match self.create() {
            Ok(()) | Err(Error::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Delete the backing file entirely.
    pub fn drop(&mut self) -> Result<()> {
        self.heap.drop_file()?;
        debug!(table = %self.table, index = %self.index_name, "index dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_then_drop_roundtrip() {
        let dir = tempdir().unwrap();
        let mut index = Index::new(dir.path(), "widgets", "ix_widgets_name");
        index.create().unwrap();
        assert!(dir.path().join("widgets_ix_widgets_name.db").exists());
        index.drop().unwrap();
        assert!(!dir.path().join("widgets_ix_widgets_name.db").exists());
    }

    #[test]
    fn create_twice_fails_already_exists() {
        let dir = tempdir().unwrap();
        let mut a = Index::new(dir.path(), "widgets", "ix_widgets_name");
        a.create().unwrap();
        let mut b = Index::new(dir.path(), "widgets", "ix_widgets_name");
        assert!(matches!(b.create(), Err(Error::AlreadyExists(_))));
    }
}
