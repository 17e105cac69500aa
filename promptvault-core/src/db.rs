use crate::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// SQLite tolerates exactly one writer, so the pool never grows past one
/// connection. Reads queue behind writes on the same connection.
pub const WRITER_POOL_SIZE: u32 = 1;

pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = if config.is_in_memory() {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        if let Some(parent) = Path::new(&config.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
    };

    let options = options
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let mut pool = SqlitePoolOptions::new()
        .max_connections(WRITER_POOL_SIZE)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds));

    if config.is_in_memory() {
        // The schema lives inside the connection; never let the pool reap it.
        pool = pool.min_connections(1).idle_timeout(None).max_lifetime(None);
    }

    pool.connect_with(options).await
}

pub async fn health_check(pool: &SqlitePool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT sqlite_version()")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn foreign_keys_enabled(pool: &SqlitePool) -> Result<bool, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(pool).await?;
    Ok(row.0 == 1)
}
