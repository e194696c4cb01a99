//! Durable local cache backed by a libSQL key-value table.

use std::path::Path;

use async_trait::async_trait;
use libsql::{params, Builder, Connection, Database};

use crate::error::{Error, Result};

use super::LocalCache;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// `LocalCache` implementation over a local libSQL file.
///
/// One `kv` table holds every cache partition (domain snapshots, change
/// logs, sync metadata, recovery backups) keyed by path-style strings.
pub struct LibSqlCache {
    _db: Database,
    conn: Connection,
}

impl LibSqlCache {
    /// Open (or create) a cache database at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::from_database(db).await
    }

    /// Open an in-memory cache (useful for testing).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db.connect()?;
        let cache = Self { _db: db, conn };
        cache.migrate().await?;
        Ok(cache)
    }

    async fn migrate(&self) -> Result<()> {
        let version = self.schema_version().await?;
        if version < 1 {
            self.conn
                .execute(
                    "CREATE TABLE IF NOT EXISTS kv (
                        key TEXT PRIMARY KEY,
                        value BLOB NOT NULL,
                        updated_at INTEGER NOT NULL
                    )",
                    (),
                )
                .await?;
            self.conn
                .execute(
                    "CREATE TABLE IF NOT EXISTS schema_version (
                        version INTEGER PRIMARY KEY,
                        applied_at INTEGER NOT NULL
                    )",
                    (),
                )
                .await?;
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, ?)",
                    params![CURRENT_VERSION, crate::util::timestamp_now_ms()],
                )
                .await?;
        }
        Ok(())
    }

    async fn schema_version(&self) -> Result<i32> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
                (),
            )
            .await?;

        let exists = match rows.next().await? {
            Some(row) => row.get::<i32>(0)? != 0,
            None => false,
        };
        if !exists {
            return Ok(0);
        }

        let mut rows = self
            .conn
            .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl LocalCache for LibSqlCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv WHERE key = ?", params![key])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<Vec<u8>>(0)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let affected = self
            .conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value.to_vec(), crate::util::timestamp_now_ms()],
            )
            .await?;
        if affected == 0 {
            return Err(Error::Persistence(format!(
                "write for key '{key}' affected no rows"
            )));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?", params![key])
            .await?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        // Escape LIKE wildcards so prefixes containing '%'/'_' stay literal.
        let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        let pattern = format!("{escaped}%");
        let mut rows = self
            .conn
            .query(
                "SELECT key FROM kv WHERE key LIKE ? ESCAPE '\\' ORDER BY key",
                params![pattern],
            )
            .await?;

        let mut keys = Vec::new();
        while let Some(row) = rows.next().await? {
            keys.push(row.get::<String>(0)?);
        }
        Ok(keys)
    }
}
