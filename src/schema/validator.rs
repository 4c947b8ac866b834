//! Schema validator
//!
//! Runs before every document write:
//! - the payload must be JSON
//! - if the namespace has a schema, the payload must satisfy it
//!
//! The schema is re-read on every call, so a schema change applies to the
//! very next write.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::errors::{SchemaError, SchemaResult};
use super::registry::SchemaRegistry;
use crate::storage::Storage;

/// Validates documents against their namespace schema
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    registry: SchemaRegistry,
}

impl SchemaValidator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            registry: SchemaRegistry::new(storage),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate `data` for `namespace`, returning the parsed document.
    ///
    /// Registry failures other than not-found propagate; a document is
    /// never accepted because its schema could not be read.
    pub async fn validate(&self, namespace: &str, data: &[u8]) -> SchemaResult<Value> {
        let schema = self.registry.compiled(namespace).await?;

        let document: Value = serde_json::from_slice(data).map_err(|e| {
            debug!(namespace, error = %e, "payload is not JSON");
            SchemaError::MalformedJson(e.to_string())
        })?;

        if let Some(schema) = schema {
            schema.validate(&document).map_err(|details| {
                info!(namespace, violation = %details, "document rejected by schema");
                SchemaError::Violation(details)
            })?;
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBackend, StorageError};
    use async_trait::async_trait;
    use serde_json::json;

    const PERSON: &[u8] = br#"{
        "type": "object",
        "properties": {
            "firstName": {"type": "string"},
            "lastName": {"type": "string"},
            "age": {"type": "integer", "minimum": 0}
        },
        "required": ["firstName", "lastName"]
    }"#;

    #[tokio::test]
    async fn test_without_schema_only_parses() {
        let validator = SchemaValidator::new(Arc::new(MemoryBackend::new()));
        assert_eq!(
            validator.validate("any", br#"{"a":1}"#).await.unwrap(),
            json!({"a": 1})
        );
        let err = validator.validate("any", b"not json").await.unwrap_err();
        assert!(matches!(err, SchemaError::MalformedJson(_)));
    }

    #[tokio::test]
    async fn test_with_schema() {
        let validator = SchemaValidator::new(Arc::new(MemoryBackend::new()));
        validator.registry().put_schema("users", PERSON).await.unwrap();

        let ok = br#"{"firstName":"John","lastName":"Doe","age":666}"#;
        assert!(validator.validate("users", ok).await.is_ok());

        let err = validator
            .validate("users", br#"{"firstName":"John"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "(root): lastName is required");

        // Other namespaces are unaffected
        assert!(validator.validate("other", br#"{"x":1}"#).await.is_ok());
    }

    #[derive(Debug)]
    struct Broken;

    #[async_trait]
    impl Storage for Broken {
        async fn init(&self) -> crate::storage::StorageResult<()> {
            Ok(())
        }
        async fn upsert(&self, _: &str, _: &str, _: &[u8]) -> crate::storage::StorageResult<()> {
            Err(StorageError::Internal("down".into()))
        }
        async fn get(&self, _: &str, _: &str) -> crate::storage::StorageResult<Vec<u8>> {
            Err(StorageError::Internal("down".into()))
        }
        async fn get_all(&self, _: &str) -> crate::storage::StorageResult<crate::storage::Documents> {
            Err(StorageError::Internal("down".into()))
        }
        async fn delete(&self, _: &str, _: &str) -> crate::storage::StorageResult<()> {
            Err(StorageError::Internal("down".into()))
        }
        async fn delete_all(&self, _: &str) -> crate::storage::StorageResult<()> {
            Err(StorageError::Internal("down".into()))
        }
        async fn list_namespaces(&self) -> Vec<String> {
            Vec::new()
        }
        fn kind(&self) -> crate::storage::BackendKind {
            crate::storage::BackendKind::Memory
        }
    }

    #[tokio::test]
    async fn test_registry_failure_propagates() {
        let validator = SchemaValidator::new(Arc::new(Broken));
        let err = validator.validate("users", br#"{"a":1}"#).await.unwrap_err();
        assert!(matches!(err, SchemaError::Storage(_)));
        assert_eq!(err.status_code(), 500);
    }
}
