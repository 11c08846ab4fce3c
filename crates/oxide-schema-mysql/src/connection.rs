//! [`Connection`] over an sqlx MySQL pool.

use std::sync::atomic::{AtomicU64, Ordering};

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use oxide_schema::{Connection, Error, Result, Row, RowStream, TableMetadata};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::decode::decode_row;
use crate::introspect::{self, ColumnRow, IndexRow};

/// A pooled MySQL connection.
///
/// Statements run through the text protocol so DDL and ad-hoc SQL work
/// without preparing.
#[derive(Debug)]
pub struct MySqlConnection {
    pool: MySqlPool,
    last_insert_id: AtomicU64,
}

impl MySqlConnection {
    /// Opens a pool for `config`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for unusable settings and `Driver` if the
    /// server cannot be reached.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.to_url()?;
        debug!(host = %config.host, database = %config.database, "Connecting to MySQL");
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url.as_str())
            .await
            .map_err(|err| Error::driver(None, err))?;
        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: MySqlPool) -> Self {
        Self {
            pool,
            last_insert_id: AtomicU64::new(0),
        }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn boxed<S>(stream: S) -> RowStream
where
    S: Stream<Item = Result<Row>> + Send + 'static,
{
    Box::pin(stream)
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn execute(&self, sql: &str) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let result = sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(|err| Error::driver(Some(sql), err))?;
        if result.last_insert_id() != 0 {
            self.last_insert_id.store(result.last_insert_id(), Ordering::SeqCst);
        }
        Ok(result.rows_affected())
    }

    fn fetch(&self, sql: &str) -> RowStream {
        let pool = self.pool.clone();
        let sql = sql.to_owned();
        boxed(try_stream! {
            debug!(sql = %sql, "Fetching rows");
            let mut rows = sqlx::raw_sql(&sql).fetch(&pool);
            while let Some(row) = rows
                .try_next()
                .await
                .map_err(|err| Error::driver(Some(&sql), err))?
            {
                yield decode_row(&row, &sql)?;
            }
        })
    }

    fn last_insert_id(&self) -> u64 {
        self.last_insert_id.load(Ordering::SeqCst)
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(introspect::TABLE_EXISTS_QUERY)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| Error::driver(Some(introspect::TABLE_EXISTS_QUERY), err))?;
        Ok(count > 0)
    }

    async fn introspect_table(&self, name: &str) -> Result<TableMetadata> {
        debug!(table = %name, "Introspecting table");
        let columns: Vec<ColumnRow> = sqlx::query_as(introspect::COLUMNS_QUERY)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| Error::driver(Some(introspect::COLUMNS_QUERY), err))?;
        if columns.is_empty() {
            return Err(Error::not_found("table", name));
        }
        let indexes: Vec<IndexRow> = sqlx::query_as(introspect::INDEXES_QUERY)
            .bind(name)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| Error::driver(Some(introspect::INDEXES_QUERY), err))?;

        Ok(TableMetadata {
            name: name.to_owned(),
            columns: columns
                .into_iter()
                .map(|row| introspect::column(name, row))
                .collect::<Result<_>>()?,
            indexes: introspect::indexes(indexes),
        })
    }
}
