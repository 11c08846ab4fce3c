//! The schema catalog: loads tables and caches their committed shape.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::connection::{Connection, TableMetadata};
use crate::dialect::DialectCompiler;
use crate::error::{Error, Result};
use crate::table::{SavePlan, TableDescriptor};

/// Index storage type every loaded index must have.
const SUPPORTED_INDEX_TYPE: &str = "BTREE";

/// Introspected table shapes keyed by table name.
///
/// Entries stay until they are invalidated, which every save and drop does
/// for the table it touched.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: Mutex<HashMap<String, Arc<TableMetadata>>>,
}

impl SchemaCache {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<TableMetadata>>> {
        // The map is valid after any panic, so keep using it.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached shape of a table.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<TableMetadata>> {
        self.lock().get(name).cloned()
    }

    fn insert(&self, metadata: Arc<TableMetadata>) {
        self.lock().insert(metadata.name.clone(), metadata);
    }

    /// Forgets a table; returns whether it was cached.
    pub fn invalidate(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }

    /// Number of cached tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[derive(Debug)]
struct CatalogInner {
    connection: Arc<dyn Connection>,
    dialect: Arc<dyn DialectCompiler>,
    cache: SchemaCache,
}

/// Entry point for creating, loading and dropping tables.
///
/// Cloning is cheap; clones share the connection and the cache.
#[derive(Debug, Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

impl Catalog {
    /// Creates a catalog over a connection and dialect.
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>, dialect: Arc<dyn DialectCompiler>) -> Self {
        Self {
            inner: Arc::new(CatalogInner {
                connection,
                dialect,
                cache: SchemaCache::default(),
            }),
        }
    }

    /// The connection statements run on.
    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.inner.connection
    }

    /// The dialect statements are compiled with.
    #[must_use]
    pub fn dialect(&self) -> &dyn DialectCompiler {
        self.inner.dialect.as_ref()
    }

    /// The table shape cache.
    #[must_use]
    pub fn cache(&self) -> &SchemaCache {
        &self.inner.cache
    }

    /// Starts declaring a table that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the table exists in the database.
    pub async fn create_table(&self, name: &str) -> Result<TableDescriptor> {
        if self.table_exists(name).await? {
            return Err(Error::already_exists("table", name));
        }
        debug!(table = %name, "Declaring new table");
        Ok(TableDescriptor::declared(name, self.clone()))
    }

    /// Loads a table, introspecting it only if it is not cached.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table does not exist, and
    /// `InvariantViolation` if it has an index the engine cannot represent.
    pub async fn get(&self, name: &str) -> Result<TableDescriptor> {
        let metadata = self.metadata(name).await?;
        Ok(TableDescriptor::loaded(&metadata, self.clone()))
    }

    /// The committed shape of a table, from the cache when possible.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn metadata(&self, name: &str) -> Result<Arc<TableMetadata>> {
        if let Some(metadata) = self.inner.cache.get(name) {
            return Ok(metadata);
        }
        if !self.table_exists(name).await? {
            return Err(Error::not_found("table", name));
        }

        debug!(table = %name, "Introspecting table");
        let metadata = self.inner.connection.introspect_table(name).await?;
        if let Some(index) = metadata
            .indexes
            .iter()
            .find(|i| !i.index_type.eq_ignore_ascii_case(SUPPORTED_INDEX_TYPE))
        {
            return Err(Error::InvariantViolation(format!(
                "index '{}' of table '{name}' has type {}; only {SUPPORTED_INDEX_TYPE} indexes are supported",
                index.name, index.index_type
            )));
        }

        let metadata = Arc::new(metadata);
        self.inner.cache.insert(Arc::clone(&metadata));
        Ok(metadata)
    }

    /// Returns the cached shape of a table without touching the database.
    #[must_use]
    pub fn cached(&self, name: &str) -> Option<Arc<TableMetadata>> {
        self.inner.cache.get(name)
    }

    /// Drops a table.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the table does not exist, and driver errors.
    pub async fn delete_table(&self, name: &str) -> Result<()> {
        let mut table = self.get(name).await?;
        table.delete();
        table.save().await?;
        Ok(())
    }

    /// Returns whether a table exists in the database.
    ///
    /// # Errors
    ///
    /// Returns driver errors.
    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        self.inner.connection.table_exists(name).await
    }

    /// Forgets the cached shape of a table; returns whether it was cached.
    pub fn invalidate(&self, name: &str) -> bool {
        let evicted = self.inner.cache.invalidate(name);
        if evicted {
            info!(table = %name, "Evicted table from schema cache");
        }
        evicted
    }

    /// Invalidates and loads a table again.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get`].
    pub async fn reload(&self, name: &str) -> Result<TableDescriptor> {
        self.invalidate(name);
        self.get(name).await
    }

    pub(crate) async fn execute(&self, sql: &str) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        self.inner.connection.execute(sql).await
    }

    /// Runs a save plan in order, stopping at the first failure.
    ///
    /// The table's cache entry is invalidated whether or not the plan
    /// completes, since a failure can leave earlier statements applied.
    pub(crate) async fn apply(&self, plan: &SavePlan) -> Result<()> {
        let mut applied: Vec<String> = Vec::with_capacity(plan.len());
        for statement in plan.statements() {
            if let Err(source) = self.execute(&statement.sql).await {
                warn!(
                    table = %plan.table(),
                    applied = applied.len(),
                    total = plan.len(),
                    failed = %statement.sql,
                    error = %source,
                    "Schema save aborted; earlier statements remain applied"
                );
                self.invalidate(plan.table());
                return Err(Error::SaveAborted {
                    table: plan.table().to_owned(),
                    applied,
                    failed: statement.sql.clone(),
                    source: Box::new(source),
                });
            }
            applied.push(statement.sql.clone());
        }
        self.invalidate(plan.table());
        Ok(())
    }
}
