//! # Filesystem Backend
//!
//! Layout: `<root>/<namespace>/<key>.json`. Writes replace the whole file
//! in place (no temp file + rename), so a crash mid-write can leave a
//! truncated document behind.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::backend::{BackendKind, Documents, Storage};
use super::errors::{StorageError, StorageResult};
use super::naming::is_storage_identifier;

const DOCUMENT_EXTENSION: &str = "json";

/// Local filesystem storage backend
#[derive(Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a backend rooted at `root`. Nothing touches the disk until `init`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn document_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_path(namespace)
            .join(format!("{}.{}", key, DOCUMENT_EXTENSION))
    }

    async fn namespace_exists(&self, namespace: &str) -> StorageResult<bool> {
        match fs::metadata(self.namespace_path(namespace)).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(fs_error(e)),
        }
    }
}

fn fs_error(e: io::Error) -> StorageError {
    StorageError::Filesystem(e.to_string())
}

#[async_trait]
impl Storage for FilesystemBackend {
    async fn init(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).await.map_err(fs_error)
    }

    async fn upsert(&self, namespace: &str, key: &str, value: &[u8]) -> StorageResult<()> {
        if !is_storage_identifier(namespace) {
            return Err(StorageError::unable_to_create(namespace, "invalid name"));
        }
        if !is_storage_identifier(key) {
            return Err(StorageError::unable_to_create(namespace, "invalid key"));
        }

        fs::create_dir_all(self.namespace_path(namespace))
            .await
            .map_err(|e| StorageError::unable_to_create(namespace, e))?;

        let path = self.document_path(namespace, key);
        // Refuse to clobber something that is not a regular file (e.g. a directory named `k.json`).
        match fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => {
                return Err(StorageError::Filesystem(format!(
                    "{} is not a regular file",
                    path.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(fs_error(e)),
        }

        fs::write(&path, value).await.map_err(fs_error)?;
        debug!(namespace, key, bytes = value.len(), "fs upsert");
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Vec<u8>> {
        if !is_storage_identifier(namespace) || !self.namespace_exists(namespace).await? {
            return Err(StorageError::namespace_not_found(namespace));
        }
        if !is_storage_identifier(key) {
            return Err(StorageError::id_not_found(namespace, key));
        }

        fs::read(self.document_path(namespace, key))
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    StorageError::id_not_found(namespace, key)
                } else {
                    fs_error(e)
                }
            })
    }

    async fn get_all(&self, namespace: &str) -> StorageResult<Documents> {
        if !is_storage_identifier(namespace) || !self.namespace_exists(namespace).await? {
            return Err(StorageError::namespace_not_found(namespace));
        }

        let mut entries = fs::read_dir(self.namespace_path(namespace))
            .await
            .map_err(fs_error)?;
        let mut documents = Documents::new();

        while let Some(entry) = entries.next_entry().await.map_err(fs_error)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_storage_identifier(key) {
                continue;
            }
            let data = fs::read(&path).await.map_err(fs_error)?;
            documents.insert(key.to_string(), data);
        }

        Ok(documents)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        if !is_storage_identifier(namespace) || !is_storage_identifier(key) {
            return Err(StorageError::id_not_found(namespace, key));
        }

        fs::remove_file(self.document_path(namespace, key))
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    StorageError::id_not_found(namespace, key)
                } else {
                    fs_error(e)
                }
            })
    }

    async fn delete_all(&self, namespace: &str) -> StorageResult<()> {
        if !is_storage_identifier(namespace) || !self.namespace_exists(namespace).await? {
            return Err(StorageError::namespace_not_found(namespace));
        }

        fs::remove_dir_all(self.namespace_path(namespace))
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    StorageError::namespace_not_found(namespace)
                } else {
                    fs_error(e)
                }
            })?;
        debug!(namespace, "fs namespace removed");
        Ok(())
    }

    async fn list_namespaces(&self) -> Vec<String> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "cannot enumerate namespaces");
                return Vec::new();
            }
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let is_dir = entry
                        .file_type()
                        .await
                        .map(|t| t.is_dir())
                        .unwrap_or(false);
                    if !is_dir {
                        continue;
                    }
                    if let Some(name) = entry.file_name().to_str() {
                        if is_storage_identifier(name) {
                            names.push(name.to_string());
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "namespace enumeration aborted");
                    break;
                }
            }
        }

        names.sort();
        names
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Filesystem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ErrorKind;
    use tempfile::TempDir;

    async fn backend() -> (TempDir, FilesystemBackend) {
        let temp = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path().join("data"));
        backend.init().await.unwrap();
        (temp, backend)
    }

    #[tokio::test]
    async fn test_layout_on_disk() {
        let (_temp, backend) = backend().await;
        backend.upsert("users", "1", b"{\"a\":1}").await.unwrap();

        let path = backend.root().join("users").join("1.json");
        assert_eq!(std::fs::read(path).unwrap(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_get_all_skips_foreign_files() {
        let (_temp, backend) = backend().await;
        backend.upsert("users", "1", b"1").await.unwrap();
        std::fs::write(backend.root().join("users").join("notes.txt"), b"x").unwrap();

        let docs = backend.get_all("users").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs["1"], b"1");
    }

    #[tokio::test]
    async fn test_traversal_names_rejected() {
        let (_temp, backend) = backend().await;
        let err = backend.upsert("..", "k", b"1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnableToCreateNamespace);
        let err = backend.upsert("ns", "../k", b"1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnableToCreateNamespace);

        let err = backend.get("../data", "k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NamespaceNotFound);
    }

    #[tokio::test]
    async fn test_list_ignores_plain_files() {
        let (_temp, backend) = backend().await;
        backend.upsert("b", "k", b"1").await.unwrap();
        backend.upsert("a", "k", b"1").await.unwrap();
        std::fs::write(backend.root().join("stray"), b"x").unwrap();

        assert_eq!(backend.list_namespaces().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_missing_root_lists_nothing() {
        let temp = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path().join("never-created"));
        assert!(backend.list_namespaces().await.is_empty());
    }
}
