//! Key-Value Storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::KeyValueStore,
};
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

/// SQLite-backed key-value store
///
/// Desktop counterpart of browser `localStorage`: string keys, string values,
/// last write wins. The gallery cache snapshot and the session identity live
/// here.
///
/// A store created with [`SqliteKeyValueStore::lazy`] opens its database on
/// first use, so it can be built outside of an async context.
pub struct SqliteKeyValueStore {
    path: Option<PathBuf>,
    pool: OnceCell<SqlitePool>,
}

impl SqliteKeyValueStore {
    /// Open (or create) a store at the given database path
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        let store = Self::lazy(db_path);
        store.pool().await?;
        Ok(store)
    }

    /// Describe a store at the given path without touching the disk yet
    pub fn lazy(db_path: PathBuf) -> Self {
        Self {
            path: Some(db_path),
            pool: OnceCell::new(),
        }
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        let store = Self {
            path: None,
            pool: OnceCell::new(),
        };
        store.pool().await?;
        Ok(store)
    }

    /// Default on-disk location under the user's data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("media-gallery")
            .join("gallery.db")
    }

    async fn pool(&self) -> Result<&SqlitePool> {
        self.pool.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> Result<SqlitePool> {
        let pool = match &self.path {
            Some(db_path) => {
                if let Some(parent) = db_path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(BridgeError::Io)?;
                }

                // SQLite URLs want forward slashes
                let path_str = db_path.to_string_lossy().replace('\\', "/");
                let db_url = format!("sqlite://{}?mode=rwc", path_str);
                let pool = SqlitePool::connect(&db_url).await.map_err(|e| {
                    BridgeError::StorageError(format!("Failed to connect to DB: {}", e))
                })?;
                debug!(path = ?db_path, "Initialized key-value store");
                pool
            }
            // A single connection keeps every query on the same in-memory database
            None => SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .map_err(|e| {
                    BridgeError::StorageError(format!("Failed to connect to DB: {}", e))
                })?,
        };

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to create table: {}", e)))?;

        Ok(pool)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(self.pool().await?)
        .await
        .map_err(|e| BridgeError::StorageError(format!("Failed to set value: {}", e)))?;

        debug!(key = key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool().await?)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to get value: {}", e)))?;

        Ok(row.map(|row| row.get(0)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(self.pool().await?)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to delete value: {}", e)))?;

        debug!(key = key, "Deleted value");
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool().await?)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to check key: {}", e)))?;

        Ok(row.is_some())
    }
}
