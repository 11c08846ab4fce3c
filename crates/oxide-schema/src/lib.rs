//! # oxide-schema
//!
//! A schema diff engine and a nested-condition query builder for MySQL.
//!
//! ## Schema changes
//!
//! Load or declare a table, describe the shape you want, and save. The
//! engine compares the declared fields and constraints with what the
//! database had when the table was loaded, emits the DDL for the
//! difference, runs it and reloads the table.
//!
//! ```ignore
//! use oxide_schema::{Engine, MySqlDialect};
//!
//! let engine = Engine::new(connection, MySqlDialect::new());
//!
//! let mut widgets = engine.schema().create_table("widgets").await?;
//! widgets.big_int("id").unsigned().auto_increment().primary_key();
//! widgets.varchar("label", 100);
//! let mut widgets = widgets.save().await?;
//!
//! widgets.int("qty").after("label");
//! let widgets = widgets.save().await?;
//! ```
//!
//! ## Queries
//!
//! ```ignore
//! let mut cursor = engine
//!     .query()
//!     .table("widgets", "w")
//!     .where_("w", "qty", ">", 0)
//!     .or()
//!     .where_("w", "label", "=", None::<String>)
//!     .quantity(50)
//!     .run()
//!     .await?;
//!
//! while let Some(row) = cursor.get().await? {
//!     println!("{:?}", row.get("label"));
//! }
//! ```

pub mod catalog;
pub mod change;
pub mod connection;
pub mod constraint;
pub mod cursor;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod field;
pub mod query;
pub mod recipes;
pub mod row;
pub mod table;
pub mod value;

#[cfg(test)]
mod testing;

pub use catalog::{Catalog, SchemaCache};
pub use change::Change;
pub use connection::{ColumnMetadata, Connection, IndexMetadata, RowStream, TableMetadata};
pub use constraint::{ConstraintDef, ConstraintDescriptor, ConstraintKind, PRIMARY_KEY_NAME};
pub use cursor::ResultCursor;
pub use dialect::{DialectCompiler, MySqlDialect};
pub use engine::Engine;
pub use error::{BoxError, Error, Result};
pub use field::{DataType, DefaultValue, FieldDef, FieldDescriptor, FieldMut, Position};
pub use query::{Condition, Conjunction, QueryBuilder, QueryMode, QueryPlan};
pub use row::Row;
pub use table::{PlannedStatement, SavePlan, StatementKind, TableDescriptor};
pub use value::Value;
