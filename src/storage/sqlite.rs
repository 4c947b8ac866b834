//! # SQLite Backend
//!
//! Same statement shapes as the Postgres backend, against a single local
//! database file.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::backend::{BackendKind, Documents, Storage};
use super::errors::{StorageError, StorageResult};
use super::naming::is_storage_identifier;
use super::sql::{create_table, drop_table, internal, is_missing_table, quote_ident};

/// Default database file name inside the configured directory
pub const DEFAULT_DB_FILE: &str = "docbrew.db";

const LIST_TABLES: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

/// SQLite configuration
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Directory holding the database file
    pub dir: PathBuf,
    pub file_name: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_name: DEFAULT_DB_FILE.to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// SQLite storage backend
#[derive(Debug)]
pub struct SqliteBackend {
    config: SqliteConfig,
    pool: OnceCell<SqlitePool>,
}

impl SqliteBackend {
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    fn pool(&self) -> StorageResult<&SqlitePool> {
        self.pool
            .get()
            .ok_or_else(|| StorageError::Internal("sqlite backend used before init".into()))
    }
}

#[async_trait]
impl Storage for SqliteBackend {
    async fn init(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.config.dir)
            .await
            .map_err(|e| StorageError::Filesystem(e.to_string()))?;

        let pool = self
            .pool
            .get_or_try_init(|| async {
                let options = SqliteConnectOptions::new()
                    .filename(self.config.db_path())
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .busy_timeout(self.config.busy_timeout);
                SqlitePoolOptions::new()
                    .max_connections(self.config.max_connections)
                    .connect_with(options)
                    .await
                    .map_err(|e| StorageError::Internal(format!("error opening sqlite: {}", e)))
            })
            .await?;

        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map_err(|e| internal("init", e))?;
        info!(path = %self.config.db_path().display(), "sqlite backend ready");
        Ok(())
    }

    async fn upsert(&self, namespace: &str, key: &str, value: &[u8]) -> StorageResult<()> {
        if !is_storage_identifier(namespace) {
            return Err(StorageError::unable_to_create(namespace, "invalid name"));
        }
        if !is_storage_identifier(key) {
            return Err(StorageError::unable_to_create(namespace, "invalid key"));
        }
        let pool = self.pool()?;

        sqlx::query(&create_table(namespace, "TEXT"))
            .execute(pool)
            .await
            .map_err(|e| {
                warn!(namespace, error = %e, "error creating table");
                StorageError::unable_to_create(namespace, e)
            })?;

        let data = std::str::from_utf8(value)
            .map_err(|_| StorageError::Internal("document is not valid UTF-8".into()))?;
        let stmt = format!(
            "INSERT INTO {} (id, data) VALUES (?1, ?2) \
             ON CONFLICT (id) DO UPDATE SET data = excluded.data",
            quote_ident(namespace)
        );
        sqlx::query(&stmt)
            .bind(key)
            .bind(data)
            .execute(pool)
            .await
            .map_err(|e| internal("upsert", e))?;

        debug!(namespace, key, bytes = value.len(), "sqlite upsert");
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Vec<u8>> {
        if !is_storage_identifier(namespace) {
            return Err(StorageError::namespace_not_found(namespace));
        }
        let stmt = format!("SELECT data FROM {} WHERE id = ?1", quote_ident(namespace));
        let row: Option<String> = sqlx::query_scalar(&stmt)
            .bind(key)
            .fetch_optional(self.pool()?)
            .await
            .map_err(|e| {
                if is_missing_table(&e) {
                    StorageError::namespace_not_found(namespace)
                } else {
                    internal("get", e)
                }
            })?;

        row.map(String::into_bytes)
            .ok_or_else(|| StorageError::id_not_found(namespace, key))
    }

    async fn get_all(&self, namespace: &str) -> StorageResult<Documents> {
        if !is_storage_identifier(namespace) {
            return Err(StorageError::namespace_not_found(namespace));
        }
        let stmt = format!("SELECT id, data FROM {} ORDER BY id", quote_ident(namespace));
        let rows: Vec<(String, String)> = sqlx::query_as(&stmt)
            .fetch_all(self.pool()?)
            .await
            .map_err(|e| {
                if is_missing_table(&e) {
                    StorageError::namespace_not_found(namespace)
                } else {
                    internal("get_all", e)
                }
            })?;

        Ok(rows
            .into_iter()
            .map(|(id, data)| (id, data.into_bytes()))
            .collect())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        if !is_storage_identifier(namespace) || !is_storage_identifier(key) {
            return Err(StorageError::id_not_found(namespace, key));
        }
        let stmt = format!("DELETE FROM {} WHERE id = ?1", quote_ident(namespace));
        let result = sqlx::query(&stmt)
            .bind(key)
            .execute(self.pool()?)
            .await
            .map_err(|e| {
                if is_missing_table(&e) {
                    StorageError::id_not_found(namespace, key)
                } else {
                    internal("delete", e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::id_not_found(namespace, key));
        }
        Ok(())
    }

    async fn delete_all(&self, namespace: &str) -> StorageResult<()> {
        if !is_storage_identifier(namespace) {
            return Err(StorageError::namespace_not_found(namespace));
        }
        sqlx::query(&drop_table(namespace))
            .execute(self.pool()?)
            .await
            .map_err(|e| {
                if is_missing_table(&e) {
                    StorageError::namespace_not_found(namespace)
                } else {
                    internal("delete_all", e)
                }
            })?;
        debug!(namespace, "sqlite table dropped");
        Ok(())
    }

    async fn list_namespaces(&self) -> Vec<String> {
        let pool = match self.pool() {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "cannot enumerate namespaces");
                return Vec::new();
            }
        };
        match sqlx::query_scalar::<_, String>(LIST_TABLES)
            .fetch_all(pool)
            .await
        {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "error on list_namespaces");
                Vec::new()
            }
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ErrorKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_single_file_layout() {
        let temp = TempDir::new().unwrap();
        let config = SqliteConfig::new(temp.path().join("db"));
        let backend = SqliteBackend::new(config.clone());
        backend.init().await.unwrap();
        backend.init().await.unwrap();

        backend.upsert("users", "1", b"{\"a\":1}").await.unwrap();
        assert!(config.db_path().exists());
        assert_eq!(backend.list_namespaces().await, vec!["users"]);
    }

    #[tokio::test]
    async fn test_missing_table_maps_to_namespace_not_found() {
        let temp = TempDir::new().unwrap();
        let backend = SqliteBackend::new(SqliteConfig::new(temp.path()));
        backend.init().await.unwrap();

        let err = backend.get_all("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceNotFound);
        let err = backend.delete_all("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceNotFound);
        let err = backend.delete("ghost", "k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdNotFound);
    }

    #[tokio::test]
    async fn test_injection_shaped_namespace_rejected() {
        let temp = TempDir::new().unwrap();
        let backend = SqliteBackend::new(SqliteConfig::new(temp.path()));
        backend.init().await.unwrap();

        let err = backend
            .upsert("x\" (id TEXT); DROP TABLE y; --", "k", b"1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnableToCreateNamespace);
    }
}
