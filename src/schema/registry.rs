//! Schema registry
//!
//! The schema for namespace `N` is an ordinary document stored at namespace
//! `N_schema` under key `_schema`, so it lives in whichever backend holds
//! the data.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::errors::{SchemaError, SchemaResult};
use super::json_schema::JsonSchema;
use crate::storage::Storage;

/// Suffix appended to a namespace to get its schema namespace
pub const SCHEMA_NAMESPACE_SUFFIX: &str = "_schema";

/// Key the schema document is stored under
pub const SCHEMA_KEY: &str = "_schema";

/// Storage namespace holding the schema for `namespace`
pub fn schema_namespace(namespace: &str) -> String {
    format!("{}{}", namespace, SCHEMA_NAMESPACE_SUFFIX)
}

/// Whether a storage namespace holds a schema rather than documents
pub fn is_schema_namespace(name: &str) -> bool {
    name.ends_with(SCHEMA_NAMESPACE_SUFFIX)
}

/// Reads and writes per-namespace schemas
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    storage: Arc<dyn Storage>,
}

impl SchemaRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store a schema for `namespace`. The payload must be JSON and must
    /// compile; the raw bytes are stored as sent.
    pub async fn put_schema(&self, namespace: &str, raw: &[u8]) -> SchemaResult<Value> {
        let schema: Value =
            serde_json::from_slice(raw).map_err(|e| SchemaError::MalformedJson(e.to_string()))?;
        JsonSchema::compile(&schema)?;

        self.storage
            .upsert(&schema_namespace(namespace), SCHEMA_KEY, raw)
            .await?;
        info!(namespace, "added schema");
        Ok(schema)
    }

    /// Raw schema bytes, or `None` when the namespace has no schema
    pub async fn get_raw(&self, namespace: &str) -> SchemaResult<Option<Vec<u8>>> {
        match self
            .storage
            .get(&schema_namespace(namespace), SCHEMA_KEY)
            .await
        {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.is_not_found() => {
                debug!(namespace, "no schema");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stored schema as JSON
    pub async fn get_schema(&self, namespace: &str) -> SchemaResult<Option<Value>> {
        match self.get_raw(namespace).await? {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| SchemaError::invalid_schema(format!("stored schema: {}", e))),
            None => Ok(None),
        }
    }

    /// Stored schema, compiled for validation
    pub async fn compiled(&self, namespace: &str) -> SchemaResult<Option<JsonSchema>> {
        match self.get_raw(namespace).await? {
            Some(raw) => JsonSchema::from_slice(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Remove the schema; fails with `IdNotFound` when there is none
    pub async fn delete_schema(&self, namespace: &str) -> SchemaResult<()> {
        self.storage
            .delete(&schema_namespace(namespace), SCHEMA_KEY)
            .await?;
        info!(namespace, "deleted schema");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ErrorKind, MemoryBackend};
    use serde_json::json;

    fn registry() -> (Arc<dyn Storage>, SchemaRegistry) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryBackend::new());
        (storage.clone(), SchemaRegistry::new(storage))
    }

    #[test]
    fn test_schema_namespace() {
        assert_eq!(schema_namespace("users"), "users_schema");
        assert!(is_schema_namespace("users_schema"));
        assert!(!is_schema_namespace("users"));
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (storage, registry) = registry();
        assert!(registry.get_schema("users").await.unwrap().is_none());

        let raw = br#"{"type":"object"}"#;
        registry.put_schema("users", raw).await.unwrap();
        assert_eq!(storage.get("users_schema", "_schema").await.unwrap(), raw.to_vec());
        assert_eq!(
            registry.get_schema("users").await.unwrap(),
            Some(json!({"type": "object"}))
        );

        registry.delete_schema("users").await.unwrap();
        assert!(registry.get_schema("users").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_bad_schemas() {
        let (storage, registry) = registry();
        let err = registry.put_schema("users", b"nope").await.unwrap_err();
        assert!(matches!(err, SchemaError::MalformedJson(_)));
        let err = registry
            .put_schema("users", br#"{"type":"wat"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSchema(_)));
        assert!(storage.list_namespaces().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_schema() {
        let (_, registry) = registry();
        let err = registry.delete_schema("users").await.unwrap_err();
        match err {
            SchemaError::Storage(e) => assert_eq!(e.kind(), ErrorKind::IdNotFound),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
