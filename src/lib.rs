//! A minimal relational database engine: slotted-page heap storage, a
//! self-describing catalog, and a small SQL DDL executor sitting on top
//! of it.
//!
//! The layers are strictly bottom-up: [`block`] durably maps a block id to
//! a fixed-size byte array, [`page`] interprets one such block as a
//! directory of variable-length records, [`heap`] collects pages into a
//! named, append-only file, [`relation`] marshals [`value::Row`]s into and
//! out of that file according to a [`value::Schema`], [`catalog`] is
//! itself built from relations and describes every other relation,
//! [`index`] gives `CREATE INDEX` a backing file of its own, and
//! [`exec`] dispatches parsed DDL statements against the catalog.

pub mod block;
pub mod catalog;
pub mod error;
pub mod exec;
pub mod heap;
pub mod index;
pub mod page;
pub mod parse;
pub mod relation;
pub mod value;

pub use catalog::Catalog;
pub use error::{Error, Result};
pub use exec::{execute, QueryResult, Statement};

use std::path::PathBuf;

/// Engine-wide configuration. The only knob exposed is where backing
/// `.db` files live; `BLOCK_SZ` is a compile-time constant (see
/// [`block::BLOCK_SZ`]), not something a deployment can tune.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
        }
    }
}

/// The engine: a catalog opened against a [`Config`], ready to execute
/// parsed statements.
pub struct Engine {
    catalog: Catalog,
}

impl Engine {
    /// Open (creating if necessary) the catalog rooted at `config.data_dir`.
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self {
            catalog: Catalog::open(&config.data_dir)?,
        })
    }

    /// Parse and execute one statement.
    pub fn run(&mut self, sql: &str) -> Result<QueryResult> {
        let stmt = parse::parse(sql)?;
        execute(&mut self.catalog, &stmt)
    }

    /// Direct access to the underlying catalog, for callers that want to
    /// execute a pre-parsed [`Statement`] or inspect schema directly.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }
}
