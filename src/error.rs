//! Error taxonomy for the storage engine and DDL executor.

use thiserror::Error;

/// Errors raised anywhere in the engine, from a single slot operation on a
/// page up through the DDL executor.
#[derive(Error, Debug)]
pub enum Error {
    /// A page lacked room for an insert or an in-place grow.
    #[error("not enough room for record")]
    NoRoom,

    /// `marshal`/`unmarshal` encountered a column whose data type is not
    /// one of the supported kinds.
    #[error("unsupported column type")]
    UnsupportedType,

    /// An `insert` row was missing a value for a column in the schema.
    #[error("missing value for column '{0}'")]
    MissingValue(String),

    /// A `CREATE TABLE`/`CREATE INDEX` column definition used a type other
    /// than `INT`/`TEXT`.
    #[error("invalid column type '{0}'")]
    InvalidColumnType(String),

    /// `CREATE INDEX` referenced a column that does not exist on the table.
    #[error("column '{0}' does not exist")]
    UnknownColumn(String),

    /// A relation's backing file already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// A duplicate column name was declared for the same table.
    #[error("duplicate column {0}.{1}")]
    DuplicateColumn(String, String),

    /// An operation this engine does not implement was requested.
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// The backing block store / filesystem failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A DDL statement failed; `message` carries the underlying cause after
    /// compensation has run.
    #[error("{0}")]
    Exec(String),

    /// A statement could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// DROP/SHOW named a relation that is not present in the catalog.
    #[error("table {0} does not exist")]
    UnknownTable(String),

    /// Attempted to drop one of the schema tables directly.
    #[error("cannot drop a schema table")]
    CannotDropSchemaTable,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
