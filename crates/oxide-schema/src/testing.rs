//! Connection stub for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::catalog::Catalog;
use crate::connection::{ColumnMetadata, Connection, IndexMetadata, RowStream, TableMetadata};
use crate::constraint::ConstraintKind;
use crate::dialect::MySqlDialect;
use crate::error::{Error, Result};
use crate::field::DataType;
use crate::row::Row;

/// Serves fixed table shapes and scripted rows, recording every statement.
#[derive(Debug, Default)]
pub struct StubConnection {
    tables: HashMap<String, TableMetadata>,
    rows: Mutex<HashMap<String, Vec<Row>>>,
    executed: Mutex<Vec<String>>,
    fetches: AtomicUsize,
    introspections: AtomicUsize,
}

impl StubConnection {
    pub fn with_rows(&self, sql: &str, rows: Vec<Row>) {
        self.rows.lock().unwrap().insert(sql.to_owned(), rows);
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn introspections(&self) -> usize {
        self.introspections.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for StubConnection {
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.executed.lock().unwrap().push(sql.to_owned());
        Ok(1)
    }

    fn fetch(&self, sql: &str) -> RowStream {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().unwrap().get(sql).cloned().unwrap_or_default();
        Box::pin(stream::iter(rows.into_iter().map(Ok)))
    }

    fn last_insert_id(&self) -> u64 {
        0
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tables.contains_key(name))
    }

    async fn introspect_table(&self, name: &str) -> Result<TableMetadata> {
        self.introspections.fetch_add(1, Ordering::SeqCst);
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("table", name))
    }
}

/// A catalog over a stub serving the given tables.
pub fn catalog_with(tables: Vec<TableMetadata>) -> (Catalog, Arc<StubConnection>) {
    let connection = Arc::new(StubConnection {
        tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        ..StubConnection::default()
    });
    let catalog = Catalog::new(connection.clone(), Arc::new(MySqlDialect::new()));
    (catalog, connection)
}

/// `id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, name VARCHAR(50)`.
pub fn table_metadata(name: &str) -> TableMetadata {
    TableMetadata {
        name: name.to_owned(),
        columns: vec![
            ColumnMetadata {
                name: "id".into(),
                data_type: DataType::Int,
                length: Some(8),
                signed: false,
                default: None,
                nullable: false,
                auto_increment: true,
            },
            ColumnMetadata {
                name: "name".into(),
                data_type: DataType::Text,
                length: Some(50),
                signed: true,
                default: None,
                nullable: false,
                auto_increment: false,
            },
        ],
        indexes: vec![IndexMetadata {
            name: "PRIMARY".into(),
            kind: ConstraintKind::Primary,
            unique: true,
            field_names: vec!["id".into()],
            index_type: "BTREE".into(),
        }],
    }
}
