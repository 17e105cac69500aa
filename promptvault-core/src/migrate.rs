//! Schema migration runner
//!
//! Scripts live on disk as `NNN_name.up.sql` / `NNN_name.down.sql` pairs.
//! The version of a script is the first `VERSION_WIDTH` characters of its
//! file name. Applied versions are recorded in `schema_migrations`; a script
//! and its ledger row are committed in the same transaction, so a failed
//! script never shows up as applied.

use crate::error::{Result, VaultError};
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const VERSION_WIDTH: usize = 3;

const UP_SUFFIX: &str = ".up.sql";
const DOWN_SUFFIX: &str = ".down.sql";

const CREATE_LEDGER: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
)
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    pub version: String,
    pub name: String,
    pub up_path: PathBuf,
    pub down_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MigrationStatus {
    pub version: String,
    pub name: String,
    pub applied: bool,
}

pub struct MigrationRunner<'a> {
    pool: &'a SqlitePool,
    dir: PathBuf,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(pool: &'a SqlitePool, dir: impl AsRef<Path>) -> Self {
        Self {
            pool,
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// List up-scripts in ascending version order, pairing each with its
    /// down-script when one exists.
    pub fn discover(&self) -> Result<Vec<MigrationScript>> {
        let mut ups: BTreeMap<String, MigrationScript> = BTreeMap::new();
        let mut downs: BTreeMap<String, PathBuf> = BTreeMap::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if let Some(stem) = file_name.strip_suffix(UP_SUFFIX) {
                let version = version_of(stem)?;
                let script = MigrationScript {
                    version: version.clone(),
                    name: stem.to_string(),
                    up_path: path.clone(),
                    down_path: None,
                };
                if let Some(existing) = ups.insert(version.clone(), script) {
                    return Err(VaultError::Migration {
                        version,
                        reason: format!("duplicate up script (also {})", existing.name),
                    });
                }
            } else if let Some(stem) = file_name.strip_suffix(DOWN_SUFFIX) {
                downs.insert(version_of(stem)?, path.clone());
            }
        }

        Ok(ups
            .into_values()
            .map(|mut script| {
                script.down_path = downs.remove(&script.version);
                script
            })
            .collect())
    }

    /// Apply every pending up-script. Safe to call repeatedly.
    pub async fn run(&self) -> Result<MigrationReport> {
        self.ensure_ledger().await?;
        let mut report = MigrationReport::default();

        for script in self.discover()? {
            if self.is_applied(&script.version).await? {
                report.skipped.push(script.version);
                continue;
            }

            let sql = tokio::fs::read_to_string(&script.up_path).await?;
            let mut tx = self.pool.begin().await?;

            sqlx::raw_sql(&sql)
                .execute(&mut *tx)
                .await
                .map_err(|e| VaultError::Migration {
                    version: script.version.clone(),
                    reason: e.to_string(),
                })?;

            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
                .bind(&script.version)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            tracing::info!(version = %script.version, name = %script.name, "Applied migration");
            report.applied.push(script.version);
        }

        Ok(report)
    }

    /// Undo the most recently applied version using its down-script.
    pub async fn rollback_latest(&self) -> Result<Option<String>> {
        self.ensure_ledger().await?;
        let Some(version) = self.applied_versions().await?.pop() else {
            return Ok(None);
        };

        let down_path = self
            .discover()?
            .into_iter()
            .find(|s| s.version == version)
            .and_then(|s| s.down_path)
            .ok_or_else(|| VaultError::Migration {
                version: version.clone(),
                reason: "no down script found".to_string(),
            })?;

        let sql = tokio::fs::read_to_string(&down_path).await?;
        let mut tx = self.pool.begin().await?;

        sqlx::raw_sql(&sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| VaultError::Migration {
                version: version.clone(),
                reason: e.to_string(),
            })?;

        sqlx::query("DELETE FROM schema_migrations WHERE version = ?1")
            .bind(&version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(version = %version, "Rolled back migration");
        Ok(Some(version))
    }

    pub async fn applied_versions(&self) -> Result<Vec<String>> {
        self.ensure_ledger().await?;
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT version FROM schema_migrations ORDER BY version ASC")
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    pub async fn status(&self) -> Result<Vec<MigrationStatus>> {
        let applied = self.applied_versions().await?;
        Ok(self
            .discover()?
            .into_iter()
            .map(|s| MigrationStatus {
                applied: applied.contains(&s.version),
                version: s.version,
                name: s.name,
            })
            .collect())
    }

    async fn ensure_ledger(&self) -> Result<()> {
        sqlx::query(CREATE_LEDGER).execute(self.pool).await?;
        Ok(())
    }

    async fn is_applied(&self, version: &str) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_one(self.pool)
            .await?;
        Ok(row.0 > 0)
    }
}

/// `"001_initial_schema"` -> `"001"`
pub fn version_of(stem: &str) -> Result<String> {
    match stem.get(..VERSION_WIDTH) {
        Some(prefix) if prefix.chars().all(|c| c.is_ascii_digit()) => Ok(prefix.to_string()),
        _ => Err(VaultError::Migration {
            version: stem.to_string(),
            reason: format!("file name must start with a {VERSION_WIDTH}-digit version"),
        }),
    }
}
