//! The capability the engine needs from a database connection.

use std::fmt::Debug;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::constraint::ConstraintKind;
use crate::error::Result;
use crate::field::{DataType, DefaultValue};
use crate::row::Row;

/// A lazy stream of result rows that owns everything it needs.
pub type RowStream = BoxStream<'static, Result<Row>>;

/// A column as reported by the database catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,
    /// Data type.
    pub data_type: DataType,
    /// Integer width in bytes or maximum text length.
    pub length: Option<u64>,
    /// Whether an integer column is signed.
    pub signed: bool,
    /// Column default.
    pub default: Option<DefaultValue>,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Whether the column auto-increments.
    pub auto_increment: bool,
}

/// An index as reported by the database catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    /// Index name; `PRIMARY` for the primary key.
    pub name: String,
    /// Primary key or secondary index.
    pub kind: ConstraintKind,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Indexed columns in sequence order.
    pub field_names: Vec<String>,
    /// Storage type, e.g. `BTREE`.
    pub index_type: String,
}

/// The committed structure of one table, columns in physical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    /// Table name.
    pub name: String,
    /// Columns in physical order.
    pub columns: Vec<ColumnMetadata>,
    /// Indexes, primary key included.
    pub indexes: Vec<IndexMetadata>,
}

/// A database connection the engine can run statements on.
///
/// Implementations must be cheap to share behind an `Arc`; the engine
/// never runs two statements on one connection concurrently.
#[async_trait]
pub trait Connection: Debug + Send + Sync + 'static {
    /// Runs a statement that returns no rows and reports affected rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Starts a query and returns its rows lazily.
    fn fetch(&self, sql: &str) -> RowStream;

    /// The id generated by the last INSERT on this connection.
    fn last_insert_id(&self) -> u64;

    /// Returns whether a table exists in the current database.
    async fn table_exists(&self, name: &str) -> Result<bool>;

    /// Reads the committed structure of a table.
    async fn introspect_table(&self, name: &str) -> Result<TableMetadata>;
}
