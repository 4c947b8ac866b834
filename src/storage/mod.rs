//! # Storage
//!
//! Namespaced document persistence behind a single [`Storage`] contract.
//!
//! ## Backends
//!
//! - **Memory**: process-lifetime map under one mutex
//! - **Filesystem**: `<root>/<namespace>/<key>.json`
//! - **Postgres**: one `(id, data)` table per namespace
//! - **SQLite**: same tables in a single local file
//!
//! Every backend reports failures with the same [`ErrorKind`]s.

mod backend;
mod config;
mod errors;
mod filesystem;
mod memory;
pub mod naming;
mod postgres;
mod sql;
mod sqlite;

pub use backend::{BackendKind, Documents, Storage};
pub use config::{open_storage, StorageConfig};
pub use errors::{ErrorKind, StorageError, StorageResult};
pub use filesystem::FilesystemBackend;
pub use memory::MemoryBackend;
pub use postgres::{PostgresBackend, PostgresConfig};
pub use sqlite::{SqliteBackend, SqliteConfig, DEFAULT_DB_FILE};
