//! # Storage Backend Trait

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use super::errors::StorageResult;

/// All documents of one namespace, ordered by key
pub type Documents = BTreeMap<String, Vec<u8>>;

/// Which medium a backend persists to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Filesystem,
    Postgres,
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Filesystem => "fs",
            BackendKind::Postgres => "postgres",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract every backend implements.
///
/// A namespace exists from its first successful upsert until `delete_all`.
/// Removing its last key leaves it existing and empty. Absent keys are
/// `IdNotFound`, absent namespaces `NamespaceNotFound`, except for `delete`
/// which reports any absent key as `IdNotFound`.
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// Idempotent setup of the backing medium. An error here is fatal at startup.
    async fn init(&self) -> StorageResult<()>;

    /// Create the namespace if needed, then write `value` under `key`,
    /// replacing any previous value.
    async fn upsert(&self, namespace: &str, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Read one document
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Read every document of a namespace
    async fn get_all(&self, namespace: &str) -> StorageResult<Documents>;

    /// Remove one document
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()>;

    /// Remove a namespace and all of its documents
    async fn delete_all(&self, namespace: &str) -> StorageResult<()>;

    /// Names of the namespaces currently known. Never fails; enumeration
    /// errors are logged and yield an empty list.
    async fn list_namespaces(&self) -> Vec<String>;

    /// The medium behind this backend
    fn kind(&self) -> BackendKind;
}
