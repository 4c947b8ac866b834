//! # Backend Selection
//!
//! Picks one backend at startup and initializes it.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::backend::Storage;
use super::errors::StorageResult;
use super::filesystem::FilesystemBackend;
use super::memory::MemoryBackend;
use super::postgres::{PostgresBackend, PostgresConfig};
use super::sqlite::{SqliteBackend, SqliteConfig};

/// Which backend to run, with its parameters
#[derive(Debug, Clone, Default)]
pub enum StorageConfig {
    #[default]
    Memory,
    Filesystem { root: PathBuf },
    Postgres(PostgresConfig),
    Sqlite(SqliteConfig),
}

impl StorageConfig {
    /// Construct the configured backend without touching the medium
    pub fn build(&self) -> Arc<dyn Storage> {
        match self {
            StorageConfig::Memory => Arc::new(MemoryBackend::new()),
            StorageConfig::Filesystem { root } => Arc::new(FilesystemBackend::new(root.clone())),
            StorageConfig::Postgres(config) => Arc::new(PostgresBackend::new(config.clone())),
            StorageConfig::Sqlite(config) => Arc::new(SqliteBackend::new(config.clone())),
        }
    }
}

/// Build and initialize the configured backend. An error here means the
/// medium is unreachable and the process should not start.
pub async fn open_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    let storage = config.build();
    storage.init().await?;
    info!(backend = %storage.kind(), "storage initialized");
    Ok(storage)
}
