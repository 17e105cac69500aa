//! Storage engine over SQLite
//!
//! `Store` is the sole owner of the connection pool. The pool holds exactly
//! one connection (`db::WRITER_POOL_SIZE`), so concurrent callers queue on
//! acquire and every statement runs under a single-writer discipline.
//! A `Store` can only be obtained after migrations have been applied.
//!
//! Tables:
//! - conversations(session_id, title, counters, paths)
//! - messages(conversation_id -> conversations, type, content, tool_calls)
//! - ratings(conversation_id | message_id, rating, comment)
//! - schema_migrations(version, applied_at)

pub mod conversations;
pub mod messages;
pub mod ratings;
pub mod records;

pub use records::{ConversationRecord, ConversationWithMessages, MessageRecord, RatingRecord};

use std::path::PathBuf;

use sqlx::SqlitePool;

use crate::config::DatabaseConfig;
use crate::db;
use crate::error::{Result, VaultError};
use crate::migrate::{MigrationReport, MigrationRunner};
use crate::models::StoreStats;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    db_path: Option<PathBuf>,
    migrations_dir: PathBuf,
}

impl Store {
    /// Connect and bring the schema up to date. Any migration failure is
    /// returned as an error and no store is handed out.
    pub async fn open(config: &DatabaseConfig) -> Result<(Self, MigrationReport)> {
        let pool = db::create_pool(config)
            .await
            .map_err(|e| VaultError::Unavailable(e.to_string()))?;

        let store = Self {
            pool,
            db_path: (!config.is_in_memory()).then(|| PathBuf::from(&config.path)),
            migrations_dir: PathBuf::from(&config.migrations_dir),
        };

        let report = store.migrations().run().await?;
        tracing::info!(
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "Schema up to date"
        );

        Ok((store, report))
    }

    /// Throwaway store for tests and dry runs.
    pub async fn open_in_memory(migrations_dir: impl Into<String>) -> Result<Self> {
        let (store, _) = Self::open(&DatabaseConfig::in_memory(migrations_dir)).await?;
        Ok(store)
    }

    pub fn migrations(&self) -> MigrationRunner<'_> {
        MigrationRunner::new(&self.pool, &self.migrations_dir)
    }

    pub fn pool_size(&self) -> u32 {
        self.pool.options().get_max_connections()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn health(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Err(VaultError::Unavailable("connection pool is closed".to_string()));
        }
        db::health_check(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| VaultError::Unavailable(e.to_string()))
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let (conversations, messages, ratings): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM conversations),
                (SELECT COUNT(*) FROM messages),
                (SELECT COUNT(*) FROM ratings)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        // Best effort: a missing or unreadable file just omits the size.
        let database_size_bytes = self
            .db_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len());

        Ok(StoreStats {
            conversations,
            messages,
            ratings,
            database_size_bytes,
        })
    }
}
