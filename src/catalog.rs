//! Self-describing catalog: the three meta-relations `_tables`, `_columns`,
//! and `_indices` describe every relation in the database, including
//! themselves.

use crate::error::{Error, Result};
use crate::relation::HeapRelation;
use crate::value::{ColumnAttribute, Handle, Row, Schema, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TABLES: &str = "_tables";
pub const COLUMNS: &str = "_columns";
pub const INDICES: &str = "_indices";

fn tables_schema() -> Schema {
    vec![("table_name".to_string(), ColumnAttribute::Text)]
}

fn columns_schema() -> Schema {
    vec![
        ("table_name".to_string(), ColumnAttribute::Text),
        ("column_name".to_string(), ColumnAttribute::Text),
        ("data_type".to_string(), ColumnAttribute::Text),
    ]
}

fn indices_schema() -> Schema {
    vec![
        ("table_name".to_string(), ColumnAttribute::Text),
        ("index_name".to_string(), ColumnAttribute::Text),
        ("seq_in_index".to_string(), ColumnAttribute::Int),
        ("column_name".to_string(), ColumnAttribute::Text),
        ("index_type".to_string(), ColumnAttribute::Text),
        ("is_unique".to_string(), ColumnAttribute::Bool),
    ]
}

/// Schema for one of the three meta-relations, bootstrapped without
/// consulting `_columns` itself.
fn schema_for(name: &str) -> Option<Schema> {
    match name {
        TABLES => Some(tables_schema()),
        COLUMNS => Some(columns_schema()),
        INDICES => Some(indices_schema()),
        _ => None,
    }
}

fn attr_to_keyword(attr: ColumnAttribute) -> &'static str {
    match attr {
        ColumnAttribute::Int => "INT",
        ColumnAttribute::Text => "TEXT",
        ColumnAttribute::Bool => "BOOL",
    }
}

fn text(row: &Row, col: &str) -> Option<String> {
    match row.get(col) {
        Some(Value::Text(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Holds the three meta-relations and hands out [`HeapRelation`] views for
/// any table, bootstrapping a table's schema from `_columns` (or, for the
/// three meta-relations themselves, from a hardcoded fallback that avoids
/// infinite recursion).
pub struct Catalog {
    data_dir: PathBuf,
    tables: HeapRelation,
    columns: HeapRelation,
    indices: HeapRelation,
}

impl Catalog {
    /// Open (creating if necessary) the three meta-relations under
    /// `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let fresh = !data_dir.join(format!("{TABLES}.db")).exists();
        let mut tables = HeapRelation::new(&data_dir, TABLES, tables_schema());
        let mut columns = HeapRelation::new(&data_dir, COLUMNS, columns_schema());
        let mut indices = HeapRelation::new(&data_dir, INDICES, indices_schema());

        tables.create_if_not_exists()?;
        tables.open()?;
        columns.create_if_not_exists()?;
        columns.open()?;
        indices.create_if_not_exists()?;
        indices.open()?;

        let mut cat = Self {
            data_dir,
            tables,
            columns,
            indices,
        };
        if fresh {
            // Only `_tables` and `_columns` are listed as rows in `_tables`
            // itself (spec.md's "two meta rows"). `_indices` is bootstrapped
            // via `schema_for` below and never gets a `_tables`/`_columns`
            // row of its own.
            cat.insert_table_row(TABLES)?;
            for (col, attr) in tables_schema() {
                cat.insert_column_row(TABLES, &col, attr)?;
            }
            cat.insert_table_row(COLUMNS)?;
            for (col, attr) in columns_schema() {
                cat.insert_column_row(COLUMNS, &col, attr)?;
            }
        }
        debug!("catalog opened");
        Ok(cat)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Names of every user-visible table (the three meta-relations excluded).
    pub fn user_tables(&self) -> Result<Vec<String>> {
        Ok(self
            .all_table_names()?
            .into_iter()
            .filter(|n| !is_meta(n))
            .collect())
    }

    /// All table names, including the three meta-relations.
    pub fn all_table_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for handle in self.tables.select()? {
            let row = self.tables.project(handle)?;
            if let Some(name) = text(&row, "table_name") {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Does `_tables` already list `name`?
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.all_table_names()?.iter().any(|n| n == name))
    }

    /// Look up `name`'s schema, reading it back from `_columns` unless it
    /// is one of the three meta-relations (whose schema is fixed).
    pub fn schema_of(&self, name: &str) -> Result<Schema> {
        if let Some(schema) = schema_for(name) {
            return Ok(schema);
        }
        let mut schema = Vec::new();
        for handle in self.find_column_handles(name)? {
            let row = self.columns.project(handle)?;
            let column_name = text(&row, "column_name").ok_or(Error::UnsupportedType)?;
            let data_type = text(&row, "data_type").ok_or(Error::UnsupportedType)?;
            let attr = ColumnAttribute::from_keyword(&data_type).ok_or(Error::UnsupportedType)?;
            schema.push((column_name, attr));
        }
        if schema.is_empty() {
            return Err(Error::UnknownTable(name.to_string()));
        }
        Ok(schema)
    }

    /// Construct a [`HeapRelation`] view for `name`, schema bootstrapped
    /// from the catalog.
    pub fn relation(&self, name: &str) -> Result<HeapRelation> {
        let schema = self.schema_of(name)?;
        Ok(HeapRelation::new(&self.data_dir, name, schema))
    }

    /// Insert one `_tables` row for `name`, returning its handle.
    pub fn insert_table_row(&mut self, name: &str) -> Result<Handle> {
        let mut row = Row::default();
        row.insert("table_name".to_string(), Value::Text(name.to_string()));
        self.tables.insert(&row)
    }

    /// Insert one `_columns` row describing `table.column`, returning its
    /// handle.
    pub fn insert_column_row(
        &mut self,
        table: &str,
        column: &str,
        attr: ColumnAttribute,
    ) -> Result<Handle> {
        let mut row = Row::default();
        row.insert("table_name".to_string(), Value::Text(table.to_string()));
        row.insert("column_name".to_string(), Value::Text(column.to_string()));
        row.insert(
            "data_type".to_string(),
            Value::Text(attr_to_keyword(attr).to_string()),
        );
        self.columns.insert(&row)
    }

    /// Insert one `_indices` row for `column` within `index_name` on
    /// `table`, at position `seq` (1-based), returning its handle.
    pub fn insert_index_row(
        &mut self,
        table: &str,
        index_name: &str,
        seq: i32,
        column: &str,
        index_type: &str,
        is_unique: bool,
    ) -> Result<Handle> {
        let mut row = Row::default();
        row.insert("table_name".to_string(), Value::Text(table.to_string()));
        row.insert("index_name".to_string(), Value::Text(index_name.to_string()));
        row.insert("seq_in_index".to_string(), Value::Int(seq));
        row.insert("column_name".to_string(), Value::Text(column.to_string()));
        row.insert(
            "index_type".to_string(),
            Value::Text(index_type.to_string()),
        );
        row.insert("is_unique".to_string(), Value::Bool(is_unique));
        self.indices.insert(&row)
    }

    /// Tombstone the `_tables` row at `handle`.
    pub fn delete_table_row(&mut self, handle: Handle) -> Result<()> {
        self.tables.del(handle)
    }

    /// Tombstone the `_columns` row at `handle`.
    pub fn delete_column_row(&mut self, handle: Handle) -> Result<()> {
        self.columns.del(handle)
    }

    /// Tombstone the `_indices` row at `handle`.
    pub fn delete_index_row(&mut self, handle: Handle) -> Result<()> {
        self.indices.del(handle)
    }

    /// Handle of the `_tables` row naming `name`, if any.
    pub fn find_table_handle(&self, name: &str) -> Result<Option<Handle>> {
        for handle in self.tables.select()? {
            let row = self.tables.project(handle)?;
            if text(&row, "table_name").as_deref() == Some(name) {
                return Ok(Some(handle));
            }
        }
        Ok(None)
    }

    /// Handles of every `_columns` row naming `table`, in insertion order.
    pub fn find_column_handles(&self, table: &str) -> Result<Vec<Handle>> {
        let mut out = Vec::new();
        for handle in self.columns.select()? {
            let row = self.columns.project(handle)?;
            if text(&row, "table_name").as_deref() == Some(table) {
                out.push(handle);
            }
        }
        Ok(out)
    }

    /// Handles of every `_indices` row for `index_name` on `table`, in
    /// `seq_in_index` order.
    pub fn find_index_handles(&self, table: &str, index_name: &str) -> Result<Vec<Handle>> {
        let mut pairs: Vec<(i32, Handle)> = Vec::new();
        for handle in self.indices.select()? {
            let row = self.indices.project(handle)?;
            if text(&row, "table_name").as_deref() == Some(table)
                && text(&row, "index_name").as_deref() == Some(index_name)
            {
                let seq = match row.get("seq_in_index") {
                    Some(Value::Int(n)) => *n,
                    _ => i32::MAX,
                };
                pairs.push((seq, handle));
            }
        }
        pairs.sort_by_key(|(seq, _)| *seq);
        Ok(pairs.into_iter().map(|(_, h)| h).collect())
    }

    /// `_indices` rows for `index_name` on `table`, in `seq_in_index` order.
    pub fn index_columns(&self, table: &str, index_name: &str) -> Result<Vec<Row>> {
        self.find_index_handles(table, index_name)?
            .into_iter()
            .map(|h| self.indices.project(h))
            .collect()
    }

    /// Every `_indices` row naming `table`, regardless of index name, in
    /// `(index_name, seq_in_index)` order.
    pub fn index_rows_for_table(&self, table: &str) -> Result<Vec<Row>> {
        let mut pairs: Vec<(String, i32, Row)> = Vec::new();
        for handle in self.indices.select()? {
            let row = self.indices.project(handle)?;
            if text(&row, "table_name").as_deref() != Some(table) {
                continue;
            }
            let index_name = text(&row, "index_name").unwrap_or_default();
            let seq = match row.get("seq_in_index") {
                Some(Value::Int(n)) => *n,
                _ => i32::MAX,
            };
            pairs.push((index_name, seq, row));
        }
        pairs.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(pairs.into_iter().map(|(_, _, row)| row).collect())
    }

    /// `_columns` rows naming `table`, in insertion (declaration) order.
    pub fn column_rows(&self, table: &str) -> Result<Vec<Row>> {
        self.find_column_handles(table)?
            .into_iter()
            .map(|h| self.columns.project(h))
            .collect()
    }

    /// Does `table` already declare an index named `index_name`?
    pub fn index_exists(&self, table: &str, index_name: &str) -> Result<bool> {
        Ok(!self.find_index_handles(table, index_name)?.is_empty())
    }
}

/// Is `name` one of the three self-describing meta-relations?
pub fn is_meta(name: &str) -> bool {
    matches!(name, TABLES | COLUMNS | INDICES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn register(catalog: &mut Catalog, name: &str, schema: &Schema) -> Handle {
        let handle = catalog.insert_table_row(name).unwrap();
        for (col, attr) in schema {
            catalog.insert_column_row(name, col, *attr).unwrap();
        }
        handle
    }

    #[test]
    fn fresh_catalog_lists_only_the_two_meta_rows() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        let mut all = catalog.all_table_names().unwrap();
        all.sort();
        assert_eq!(all, vec![COLUMNS, TABLES]);
        assert_eq!(catalog.user_tables().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn meta_relations_describe_themselves() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        let schema = catalog.schema_of(COLUMNS).unwrap();
        assert_eq!(
            schema,
            vec![
                ("table_name".to_string(), ColumnAttribute::Text),
                ("column_name".to_string(), ColumnAttribute::Text),
                ("data_type".to_string(), ColumnAttribute::Text),
            ]
        );
    }

    #[test]
    fn register_and_look_up_user_table() {
        let dir = tempdir().unwrap();
        let mut catalog = Catalog::open(dir.path()).unwrap();
        let schema = vec![
            ("id".to_string(), ColumnAttribute::Int),
            ("name".to_string(), ColumnAttribute::Text),
        ];
        register(&mut catalog, "widgets", &schema);
        assert!(catalog.table_exists("widgets").unwrap());
        assert_eq!(catalog.user_tables().unwrap(), vec!["widgets".to_string()]);
        assert_eq!(catalog.schema_of("widgets").unwrap(), schema);
    }

    #[test]
    fn unknown_table_schema_lookup_fails() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        assert!(matches!(
            catalog.schema_of("ghost"),
            Err(Error::UnknownTable(name)) if name == "ghost"
        ));
    }

    #[test]
    fn reopening_catalog_preserves_registrations() {
        let dir = tempdir().unwrap();
        {
            let mut catalog = Catalog::open(dir.path()).unwrap();
            register(
                &mut catalog,
                "widgets",
                &vec![("id".to_string(), ColumnAttribute::Int)],
            );
        }
        let catalog = Catalog::open(dir.path()).unwrap();
        assert!(catalog.table_exists("widgets").unwrap());
    }

    #[test]
    fn deleting_table_and_column_rows_removes_them_from_lookups() {
        let dir = tempdir().unwrap();
        let mut catalog = Catalog::open(dir.path()).unwrap();
        let schema = vec![("id".to_string(), ColumnAttribute::Int)];
        let table_handle = register(&mut catalog, "widgets", &schema);
        for handle in catalog.find_column_handles("widgets").unwrap() {
            catalog.delete_column_row(handle).unwrap();
        }
        catalog.delete_table_row(table_handle).unwrap();
        assert!(!catalog.table_exists("widgets").unwrap());
        assert!(catalog.find_column_handles("widgets").unwrap().is_empty());
    }
}
