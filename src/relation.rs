//! Heap relation: a schema-driven, row-oriented view over a [`HeapFile`],
//! with the bit-exact `marshal`/`unmarshal` byte contract (INT = 4-byte
//! little-endian, TEXT = 2-byte little-endian length prefix + UTF-8 bytes,
//! BOOL = 1 byte) that makes every relation, including the catalog's own
//! meta-relations, self-describing on disk.

use crate::block::BlockId;
use crate::error::{Error, Result};
use crate::heap::HeapFile;
use crate::value::{ColumnAttribute, Handle, Identifier, Row, Schema, Value};
use tracing::debug;

/// A relation backed by one [`HeapFile`], laid out according to `schema`.
pub struct HeapRelation {
    name: String,
    schema: Schema,
    heap: HeapFile,
}

impl HeapRelation {
    /// Construct a relation view. Does not touch the backing file.
    pub fn new(data_dir: impl AsRef<std::path::Path>, name: &str, schema: Schema) -> Self {
        Self {
            name: name.to_string(),
            heap: HeapFile::new(data_dir, name),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create the backing heap file. Unlike the source this is grounded on,
    /// failure here propagates rather than being swallowed: the DDL
    /// executor's compensation only works if a failed `create` is visible
    /// to its caller.
    pub fn create(&mut self) -> Result<()> {
        self.heap.create()?;
        debug!(table = %self.name, "relation created");
        Ok(())
    }

    /// Open the backing heap file if it already exists; only if that fails
    /// does this create it. Used when bootstrapping the catalog's own
    /// meta-relations, which may already be present on disk.
    pub fn create_if_not_exists(&mut self) -> Result<()> {
        match self.open() {
            Ok(()) => Ok(()),
            Err(_) => self.create(),
        }
    }

    /// Open the backing heap file for reading and writing.
    pub fn open(&mut self) -> Result<()> {
        self.heap.open()
    }

    /// Close the backing heap file. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.heap.close()
    }

    /// Delete the backing heap file entirely.
    pub fn drop(&mut self) -> Result<()> {
        self.heap.drop_file()?;
        debug!(table = %self.name, "relation dropped");
        Ok(())
    }

    /// Validate that `row` has exactly a value for every schema column of
    /// the matching type, returning the bytes that `append` would write.
    pub fn validate(&self, row: &Row) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for (col, attr) in &self.schema {
            let value = row
                .get(col)
                .ok_or_else(|| Error::MissingValue(col.clone()))?;
            marshal_one(&mut buf, *attr, value)?;
        }
        Ok(buf)
    }

    /// Validate and append `row`, returning the [`Handle`] of the new
    /// record. Appends to the last allocated block if it has room,
    /// otherwise allocates a new block.
    pub fn insert(&mut self, row: &Row) -> Result<Handle> {
        let bytes = self.validate(row)?;
        self.append(&bytes)
    }

    /// Append an already-marshaled record. Tries the last allocated block
    /// first; only on `NoRoom` does it allocate a fresh one and retry there.
    pub fn append(&mut self, bytes: &[u8]) -> Result<Handle> {
        if let Some(&last) = self.heap.block_ids().last() {
            let mut page = self.heap.get(last)?;
            match page.add(bytes) {
                Ok(record_id) => {
                    self.heap.put(last, page)?;
                    return Ok(Handle::new(last, record_id));
                }
                Err(Error::NoRoom) => {}
                Err(e) => return Err(e),
            }
        }
        let (block_id, mut page) = self.heap.get_new()?;
        let record_id = page.add(bytes)?;
        self.heap.put(block_id, page)?;
        Ok(Handle::new(block_id, record_id))
    }

    /// Handles of every live record in the relation, in block order.
    pub fn select(&self) -> Result<Vec<Handle>> {
        let mut out = Vec::new();
        for block_id in self.heap.block_ids() {
            let page = self.heap.get(block_id)?;
            for record_id in page.ids() {
                out.push(Handle::new(block_id, record_id));
            }
        }
        Ok(out)
    }

    /// Predicated select is not implemented; this engine only ever scans.
    pub fn select_where(&self, _equals: &Row) -> Result<Vec<Handle>> {
        Err(Error::NotImplemented("select with a WHERE predicate"))
    }

    /// Unmarshal every column of the record at `handle`.
    pub fn project(&self, handle: Handle) -> Result<Row> {
        self.project_columns(handle, &self.schema.iter().map(|(c, _)| c.clone()).collect::<Vec<_>>())
    }

    /// Unmarshal only `columns` of the record at `handle`.
    pub fn project_columns(&self, handle: Handle, columns: &[Identifier]) -> Result<Row> {
        let page = self.heap.get(handle.block_id)?;
        let bytes = page
            .get(handle.record_id)
            .ok_or_else(|| Error::Exec(format!("no such record {handle}")))?;
        let full = unmarshal(bytes, &self.schema)?;
        let mut row = Row::default();
        for col in columns {
            if let Some(v) = full.get(col) {
                row.insert(col.clone(), v.clone());
            }
        }
        Ok(row)
    }

    /// In-place update is not implemented: this engine's statement contract
    /// has no UPDATE, so nothing ever calls this.
    pub fn update(&mut self, _handle: Handle, _row: &Row) -> Result<()> {
        Err(Error::NotImplemented("update"))
    }

    /// Tombstone the record at `handle`. There is no SQL-level DELETE
    /// statement, but the DDL executor uses this directly (by handle, never
    /// by predicate) to undo a partially applied CREATE and to clean up
    /// `_columns`/`_tables` rows on DROP TABLE.
    pub fn del(&mut self, handle: Handle) -> Result<()> {
        let mut page = self.heap.get(handle.block_id)?;
        page.del(handle.record_id);
        self.heap.put(handle.block_id, page)?;
        Ok(())
    }

    /// Ids of every block currently backing this relation.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.heap.block_ids()
    }
}

fn marshal_one(buf: &mut Vec<u8>, attr: ColumnAttribute, value: &Value) -> Result<()> {
    match (attr, value) {
        (ColumnAttribute::Int, Value::Int(n)) => {
            buf.extend_from_slice(&n.to_le_bytes());
            Ok(())
        }
        (ColumnAttribute::Text, Value::Text(s)) => {
            let bytes = s.as_bytes();
            let len: u16 = bytes
                .len()
                .try_into()
                .map_err(|_| Error::UnsupportedType)?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(bytes);
            Ok(())
        }
        (ColumnAttribute::Bool, Value::Bool(b)) => {
            buf.push(if *b { 1 } else { 0 });
            Ok(())
        }
        _ => Err(Error::UnsupportedType),
    }
}

/// Decode every column of `schema` out of `bytes` in schema order.
pub fn unmarshal(bytes: &[u8], schema: &Schema) -> Result<Row> {
    let mut row = Row::default();
    let mut pos = 0usize;
    for (col, attr) in schema {
        let value = match attr {
            ColumnAttribute::Int => {
                let slice = bytes
                    .get(pos..pos + 4)
                    .ok_or(Error::UnsupportedType)?;
                let n = i32::from_le_bytes(slice.try_into().unwrap());
                pos += 4;
                Value::Int(n)
            }
            ColumnAttribute::Text => {
                let len_slice = bytes.get(pos..pos + 2).ok_or(Error::UnsupportedType)?;
                let len = u16::from_le_bytes(len_slice.try_into().unwrap()) as usize;
                pos += 2;
                let str_slice = bytes.get(pos..pos + len).ok_or(Error::UnsupportedType)?;
                let s = std::str::from_utf8(str_slice)
                    .map_err(|_| Error::UnsupportedType)?
                    .to_string();
                pos += len;
                Value::Text(s)
            }
            ColumnAttribute::Bool => {
                let b = *bytes.get(pos).ok_or(Error::UnsupportedType)?;
                pos += 1;
                Value::Bool(b != 0)
            }
        };
        row.insert(col.clone(), value);
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn schema() -> Schema {
        vec![
            ("id".to_string(), ColumnAttribute::Int),
            ("name".to_string(), ColumnAttribute::Text),
            ("active".to_string(), ColumnAttribute::Bool),
        ]
    }

    fn row(id: i32, name: &str, active: bool) -> Row {
        let mut r = Row::default();
        r.insert("id".to_string(), Value::Int(id));
        r.insert("name".to_string(), Value::Text(name.to_string()));
        r.insert("active".to_string(), Value::Bool(active));
        r
    }

    #[test]
    fn insert_and_project_roundtrip() {
        let dir = tempdir().unwrap();
        let mut rel = HeapRelation::new(dir.path(), "people", schema());
        rel.create().unwrap();

        let h1 = rel.insert(&row(1, "ada", true)).unwrap();
        let h2 = rel.insert(&row(2, "grace", false)).unwrap();

        assert_eq!(rel.project(h1).unwrap(), row(1, "ada", true));
        assert_eq!(rel.project(h2).unwrap(), row(2, "grace", false));
        assert_eq!(rel.select().unwrap(), vec![h1, h2]);
    }

    #[test]
    fn insert_missing_column_fails() {
        let dir = tempdir().unwrap();
        let mut rel = HeapRelation::new(dir.path(), "people", schema());
        rel.create().unwrap();
        let mut partial = Row::default();
        partial.insert("id".to_string(), Value::Int(1));
        assert!(matches!(
            rel.insert(&partial),
            Err(Error::MissingValue(col)) if col == "name"
        ));
    }

    #[test]
    fn zero_length_text_roundtrips() {
        let dir = tempdir().unwrap();
        let mut rel = HeapRelation::new(dir.path(), "people", schema());
        rel.create().unwrap();
        let h = rel.insert(&row(1, "", true)).unwrap();
        assert_eq!(rel.project(h).unwrap(), row(1, "", true));
    }

    #[test]
    fn select_spans_multiple_blocks() {
        let dir = tempdir().unwrap();
        let mut rel = HeapRelation::new(dir.path(), "people", schema());
        rel.create().unwrap();
        let long_name = "x".repeat(500);
        let mut handles = Vec::new();
        for i in 0..30 {
            handles.push(rel.insert(&row(i, &long_name, i % 2 == 0)).unwrap());
        }
        assert!(rel.block_ids().len() > 1);
        assert_eq!(rel.select().unwrap(), handles);
    }

    #[test]
    fn project_columns_subset() {
        let dir = tempdir().unwrap();
        let mut rel = HeapRelation::new(dir.path(), "people", schema());
        rel.create().unwrap();
        let h = rel.insert(&row(7, "turing", true)).unwrap();
        let partial = rel
            .project_columns(h, &["name".to_string()])
            .unwrap();
        assert_eq!(partial.len(), 1);
        assert_eq!(partial.get("name"), Some(&Value::Text("turing".to_string())));
    }
}
