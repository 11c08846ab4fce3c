//! The engine: a connection, a dialect and an optional database name.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::connection::Connection;
use crate::cursor::ResultCursor;
use crate::dialect::DialectCompiler;
use crate::error::Result;
use crate::query::QueryBuilder;

/// Entry point for schema changes and queries.
///
/// Cloning is cheap; clones share the connection and the schema cache.
#[derive(Debug, Clone)]
pub struct Engine {
    catalog: Catalog,
    database: Option<String>,
}

impl Engine {
    /// Creates an engine over a connection, compiling SQL with `dialect`.
    #[must_use]
    pub fn new<C, D>(connection: C, dialect: D) -> Self
    where
        C: Connection,
        D: DialectCompiler + 'static,
    {
        Self::from_shared(Arc::new(connection), Arc::new(dialect))
    }

    /// Creates an engine over shared handles.
    #[must_use]
    pub fn from_shared(connection: Arc<dyn Connection>, dialect: Arc<dyn DialectCompiler>) -> Self {
        Self::from_catalog(Catalog::new(connection, dialect))
    }

    /// Creates an engine sharing an existing catalog and its cache.
    #[must_use]
    pub const fn from_catalog(catalog: Catalog) -> Self {
        Self {
            catalog,
            database: None,
        }
    }

    /// Qualifies the FROM tables of queries with a database name.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// The schema catalog.
    #[must_use]
    pub const fn schema(&self) -> &Catalog {
        &self.catalog
    }

    /// Starts a query.
    #[must_use]
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new(self.clone())
    }

    /// The dialect SQL is compiled with.
    #[must_use]
    pub fn dialect(&self) -> &dyn DialectCompiler {
        self.catalog.dialect()
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        self.catalog.connection()
    }

    /// The database name queries are qualified with.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Runs a raw query and returns a lazy cursor over its rows.
    #[must_use]
    pub fn raw(&self, sql: impl Into<String>) -> ResultCursor {
        ResultCursor::open(self.connection().clone(), sql.into())
    }

    /// Runs a raw statement and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        self.catalog.execute(sql).await
    }

    /// The id generated by the last INSERT.
    #[must_use]
    pub fn last_insert_id(&self) -> u64 {
        self.connection().last_insert_id()
    }
}
