//! DDL executor: dispatches parsed statements against a [`Catalog`],
//! sequencing catalog and heap-file mutations with rollback on partial
//! failure.

use crate::catalog::{is_meta, Catalog};
use crate::error::{Error, Result};
use crate::index::Index;
use crate::parse::{CreateKind, CreateStatement, DropKind, DropStatement, ShowKind, ShowStatement};
use crate::value::{ColumnAttribute, Handle, Row, Value};
use tracing::{debug, warn};

/// The outcome of one executed statement, ready to render to a REPL.
#[derive(Debug, Default)]
pub struct QueryResult {
    pub column_names: Option<Vec<String>>,
    pub column_attributes: Option<Vec<ColumnAttribute>>,
    pub rows: Option<Vec<Row>>,
    pub message: String,
}

impl QueryResult {
    fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    fn projection(names: Vec<String>, attrs: Vec<ColumnAttribute>, rows: Vec<Row>) -> Self {
        let n = rows.len();
        Self {
            column_names: Some(names),
            column_attributes: Some(attrs),
            rows: Some(rows),
            message: format!("successfully returned {n} rows"),
        }
    }
}

impl std::fmt::Display for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(names), Some(attrs), Some(rows)) =
            (&self.column_names, &self.column_attributes, &self.rows)
        {
            writeln!(f, "{}", names.join(" "))?;
            for _ in names {
                write!(f, "+----------")?;
            }
            writeln!(f, "+")?;
            for row in rows {
                let mut cells = Vec::with_capacity(names.len());
                for name in names {
                    cells.push(render_cell(row.get(name.as_str())));
                }
                writeln!(f, "{}", cells.join(" "))?;
            }
            let _ = attrs;
        }
        write!(f, "{}", self.message)
    }
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::Int(n)) => n.to_string(),
        Some(Value::Text(s)) => format!("\"{s}\""),
        Some(Value::Bool(b)) => b.to_string(),
        None => "???".to_string(),
    }
}

/// An inverse action recorded as a DDL statement's mutations succeed.
/// `Drop` cannot reach the `Catalog` it needs to undo against, so rollback
/// is run explicitly by the caller via [`Compensation::rollback`] rather
/// than on scope exit; `commit` simply discards the recorded actions.
enum Undo {
    DeleteTableRow(Handle),
    DeleteColumnRow(Handle),
    DeleteIndexRow(Handle),
    DropIndexFile(String, String),
}

#[derive(Default)]
struct Compensation {
    actions: Vec<Undo>,
}

impl Compensation {
    fn push(&mut self, undo: Undo) {
        self.actions.push(undo);
    }

    fn commit(self) {
        // Discard without running anything.
    }

    /// Run every recorded action in reverse, swallowing secondary failures
    /// (logged, not propagated) per the compensation contract.
    fn rollback(self, catalog: &mut Catalog) {
        for undo in self.actions.into_iter().rev() {
            let result = match undo {
                Undo::DeleteTableRow(h) => catalog.delete_table_row(h),
                Undo::DeleteColumnRow(h) => catalog.delete_column_row(h),
                Undo::DeleteIndexRow(h) => catalog.delete_index_row(h),
                Undo::DropIndexFile(table, index_name) => {
                    Index::new(catalog.data_dir(), &table, &index_name).drop()
                }
            };
            if let Err(e) = result {
                warn!(error = %e, "compensation action failed, swallowing");
            }
        }
    }
}

/// Dispatch one parsed statement.
pub fn execute(catalog: &mut Catalog, stmt: &Statement) -> Result<QueryResult> {
    match stmt {
        Statement::Create(s) => match s.kind {
            CreateKind::Table => create_table(catalog, s),
            CreateKind::Index => create_index(catalog, s),
        },
        Statement::Drop(s) => match s.kind {
            DropKind::Table => drop_table(catalog, s),
            DropKind::Index => Err(Error::NotImplemented("DROP INDEX")),
        },
        Statement::Show(s) => match s.kind {
            ShowKind::Tables => show_tables(catalog),
            ShowKind::Columns => show_columns(catalog, s),
            ShowKind::Index => show_index(catalog, s),
        },
    }
}

/// A parsed top-level statement, as produced by `parse.rs`.
pub enum Statement {
    Create(CreateStatement),
    Drop(DropStatement),
    Show(ShowStatement),
}

fn create_table(catalog: &mut Catalog, stmt: &CreateStatement) -> Result<QueryResult> {
    let name = &stmt.table_name;
    if catalog.table_exists(name)? {
        return Err(Error::Exec(format!("{name} already exists")));
    }
    let mut seen = std::collections::HashSet::new();
    for (col, _) in &stmt.columns {
        if !seen.insert(col.clone()) {
            return Err(Error::DuplicateColumn(name.clone(), col.clone()));
        }
    }

    let mut comp = Compensation::default();
    let result = (|| -> Result<()> {
        let table_handle = catalog.insert_table_row(name)?;
        comp.push(Undo::DeleteTableRow(table_handle));

        let mut schema = Vec::with_capacity(stmt.columns.len());
        for (col, type_word) in &stmt.columns {
            let attr = ColumnAttribute::from_keyword(type_word)
                .ok_or_else(|| Error::InvalidColumnType(type_word.clone()))?;
            let handle = catalog.insert_column_row(name, col, attr)?;
            comp.push(Undo::DeleteColumnRow(handle));
            schema.push((col.clone(), attr));
        }

        let mut relation = catalog.relation(name)?;
        if stmt.if_not_exists {
            relation.create_if_not_exists()?;
        } else {
            relation.create()?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            comp.commit();
            debug!(table = %name, "create table succeeded");
            Ok(QueryResult::message(format!("created {name}")))
        }
        Err(e) => {
            comp.rollback(catalog);
            Err(Error::Exec(e.to_string()))
        }
    }
}

fn create_index(catalog: &mut Catalog, stmt: &CreateStatement) -> Result<QueryResult> {
    let table = &stmt.table_name;
    let index_name = stmt
        .index_name
        .as_ref()
        .ok_or_else(|| Error::Exec("CREATE INDEX requires an index name".to_string()))?;
    let index_type = stmt.index_type.as_deref().unwrap_or("BTREE");
    let columns = stmt
        .index_columns
        .as_ref()
        .ok_or_else(|| Error::Exec("CREATE INDEX requires at least one column".to_string()))?;

    let schema = catalog.schema_of(table)?;
    for col in columns {
        if !schema.iter().any(|(c, _)| c == col) {
            return Err(Error::UnknownColumn(col.clone()));
        }
    }

    let is_unique = index_type.eq_ignore_ascii_case("BTREE");
    let mut comp = Compensation::default();
    let result = (|| -> Result<()> {
        for (i, col) in columns.iter().enumerate() {
            let handle = catalog.insert_index_row(
                table,
                index_name,
                i as i32 + 1,
                col,
                index_type,
                is_unique,
            )?;
            comp.push(Undo::DeleteIndexRow(handle));
        }
        let mut index = Index::new(catalog.data_dir(), table, index_name);
        index.create()?;
        comp.push(Undo::DropIndexFile(table.clone(), index_name.clone()));
        Ok(())
    })();

    match result {
        Ok(()) => {
            comp.commit();
            debug!(table = %table, index = %index_name, "create index succeeded");
            Ok(QueryResult::message(format!(
                "created index {index_name}"
            )))
        }
        Err(e) => {
            comp.rollback(catalog);
            Err(Error::Exec(e.to_string()))
        }
    }
}

fn drop_table(catalog: &mut Catalog, stmt: &DropStatement) -> Result<QueryResult> {
    let name = &stmt.name;
    if is_meta(name) {
        return Err(Error::CannotDropSchemaTable);
    }
    if !catalog.table_exists(name)? {
        return Err(Error::UnknownTable(name.clone()));
    }

    for handle in catalog.find_column_handles(name)? {
        catalog.delete_column_row(handle)?;
    }
    let mut relation = catalog.relation(name)?;
    relation.drop()?;
    if let Some(handle) = catalog.find_table_handle(name)? {
        catalog.delete_table_row(handle)?;
    }
    debug!(table = %name, "drop table succeeded");
    Ok(QueryResult::message(format!("dropped {name}")))
}

fn show_tables(catalog: &Catalog) -> Result<QueryResult> {
    let rows: Vec<Row> = catalog
        .user_tables()?
        .into_iter()
        .map(|name| {
            let mut row = Row::default();
            row.insert("table_name".to_string(), Value::Text(name));
            row
        })
        .collect();
    Ok(QueryResult::projection(
        vec!["table_name".to_string()],
        vec![ColumnAttribute::Text],
        rows,
    ))
}

fn show_columns(catalog: &Catalog, stmt: &ShowStatement) -> Result<QueryResult> {
    let table = stmt
        .table_name
        .as_ref()
        .ok_or_else(|| Error::Exec("SHOW COLUMNS requires a table name".to_string()))?;
    let rows = catalog.column_rows(table)?;
    Ok(QueryResult::projection(
        vec![
            "table_name".to_string(),
            "column_name".to_string(),
            "data_type".to_string(),
        ],
        vec![
            ColumnAttribute::Text,
            ColumnAttribute::Text,
            ColumnAttribute::Text,
        ],
        rows,
    ))
}

fn show_index(catalog: &Catalog, stmt: &ShowStatement) -> Result<QueryResult> {
    let table = stmt
        .table_name
        .as_ref()
        .ok_or_else(|| Error::Exec("SHOW INDEX requires a table name".to_string()))?;
    let rows = catalog.index_rows_for_table(table)?;
    Ok(QueryResult::projection(
        vec![
            "table_name".to_string(),
            "index_name".to_string(),
            "seq_in_index".to_string(),
            "column_name".to_string(),
            "index_type".to_string(),
            "is_unique".to_string(),
        ],
        vec![
            ColumnAttribute::Text,
            ColumnAttribute::Text,
            ColumnAttribute::Int,
            ColumnAttribute::Text,
            ColumnAttribute::Text,
            ColumnAttribute::Bool,
        ],
        rows,
    ))
}
