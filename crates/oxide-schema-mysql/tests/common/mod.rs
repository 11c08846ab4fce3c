//! Helpers for tests that need a live MySQL server.

#![allow(dead_code)]

use oxide_schema::Engine;
use oxide_schema_mysql::{connect, DatabaseConfig};

/// Connects to the server named by `MYSQL_URL`.
pub async fn live_engine() -> Engine {
    let url = std::env::var("MYSQL_URL").expect("MYSQL_URL must point at a scratch database");
    let config = DatabaseConfig::from_url(&url).unwrap();
    connect(&config).await.unwrap()
}

/// A table name unlikely to clash between runs.
pub fn scratch_table(prefix: &str) -> String {
    format!("{prefix}_{}", std::process::id())
}
