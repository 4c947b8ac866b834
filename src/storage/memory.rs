//! # In-Memory Backend
//!
//! Process-lifetime storage. One mutex guards the whole map, reads
//! included, so every write is immediately visible to the next reader.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::backend::{BackendKind, Documents, Storage};
use super::errors::{StorageError, StorageResult};
use super::naming::is_storage_identifier;

type Namespaces = HashMap<String, HashMap<String, Vec<u8>>>;

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    namespaces: Mutex<Namespaces>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Namespaces>> {
        self.namespaces
            .lock()
            .map_err(|_| StorageError::Internal("Lock poisoned".into()))
    }
}

#[async_trait]
impl Storage for MemoryBackend {
    async fn init(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn upsert(&self, namespace: &str, key: &str, value: &[u8]) -> StorageResult<()> {
        if !is_storage_identifier(namespace) {
            return Err(StorageError::unable_to_create(namespace, "invalid name"));
        }
        if !is_storage_identifier(key) {
            return Err(StorageError::unable_to_create(namespace, "invalid key"));
        }
        let mut namespaces = self.lock()?;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        debug!(namespace, key, bytes = value.len(), "memory upsert");
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Vec<u8>> {
        if !is_storage_identifier(namespace) {
            return Err(StorageError::namespace_not_found(namespace));
        }
        let namespaces = self.lock()?;
        let ns = namespaces
            .get(namespace)
            .ok_or_else(|| StorageError::namespace_not_found(namespace))?;
        ns.get(key)
            .cloned()
            .ok_or_else(|| StorageError::id_not_found(namespace, key))
    }

    async fn get_all(&self, namespace: &str) -> StorageResult<Documents> {
        if !is_storage_identifier(namespace) {
            return Err(StorageError::namespace_not_found(namespace));
        }
        let namespaces = self.lock()?;
        let ns = namespaces
            .get(namespace)
            .ok_or_else(|| StorageError::namespace_not_found(namespace))?;
        Ok(ns
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        if !is_storage_identifier(namespace) || !is_storage_identifier(key) {
            return Err(StorageError::id_not_found(namespace, key));
        }
        let mut namespaces = self.lock()?;
        namespaces
            .get_mut(namespace)
            .and_then(|ns| ns.remove(key))
            .map(|_| ())
            .ok_or_else(|| StorageError::id_not_found(namespace, key))
    }

    async fn delete_all(&self, namespace: &str) -> StorageResult<()> {
        if !is_storage_identifier(namespace) {
            return Err(StorageError::namespace_not_found(namespace));
        }
        let mut namespaces = self.lock()?;
        match namespaces.remove(namespace) {
            Some(ns) => {
                debug!(namespace, documents = ns.len(), "memory namespace dropped");
                Ok(())
            }
            None => Err(StorageError::namespace_not_found(namespace)),
        }
    }

    async fn list_namespaces(&self) -> Vec<String> {
        match self.lock() {
            Ok(namespaces) => {
                let mut names: Vec<String> = namespaces.keys().cloned().collect();
                names.sort();
                names
            }
            Err(e) => {
                warn!(error = %e, "cannot enumerate namespaces");
                Vec::new()
            }
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ErrorKind;

    #[tokio::test]
    async fn test_upsert_creates_namespace() {
        let backend = MemoryBackend::new();
        backend.upsert("ns1", "first", b"true").await.unwrap();

        assert_eq!(backend.get("ns1", "first").await.unwrap(), b"true");
        assert_eq!(backend.list_namespaces().await, vec!["ns1"]);
    }

    #[tokio::test]
    async fn test_missing_namespace_vs_missing_key() {
        let backend = MemoryBackend::new();
        let err = backend.get("nope", "k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceNotFound);

        backend.upsert("ns", "a", b"1").await.unwrap();
        let err = backend.get("ns", "b").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdNotFound);
    }

    #[tokio::test]
    async fn test_emptied_namespace_still_exists() {
        let backend = MemoryBackend::new();
        backend.upsert("ns", "a", b"1").await.unwrap();
        backend.delete("ns", "a").await.unwrap();

        assert!(backend.get_all("ns").await.unwrap().is_empty());
        backend.delete_all("ns").await.unwrap();
        let err = backend.get_all("ns").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceNotFound);
    }

    #[tokio::test]
    async fn test_instances_are_independent() {
        let a = MemoryBackend::new();
        let b = MemoryBackend::new();
        a.upsert("ns", "k", b"1").await.unwrap();
        assert!(b.list_namespaces().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_identifiers_rejected() {
        let backend = MemoryBackend::new();
        let err = backend.upsert("a-b", "k", b"1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnableToCreateNamespace);
        let err = backend.upsert("ns", "../k", b"1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnableToCreateNamespace);
        assert!(backend.list_namespaces().await.is_empty());

        backend.upsert("ns", "k", b"1").await.unwrap();
        let err = backend.get("a-b", "k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceNotFound);
        let err = backend.get("ns", "a b").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdNotFound);
        let err = backend.delete("ns", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdNotFound);
        let err = backend.delete_all("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceNotFound);
    }
}
