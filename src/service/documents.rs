//! # Document Service
//!
//! The write path: check names, validate against the namespace schema,
//! write, then publish. Events go out only after the storage call
//! succeeded, and a slow subscriber never fails the write.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::errors::{ServiceError, ServiceResult};
use crate::query::{run_filter, SearchHit};
use crate::realtime::{Broker, ChangeEvent, Subscriber};
use crate::schema::{is_schema_namespace, SchemaValidator};
use crate::storage::{naming::is_valid_name, Storage};

/// One document of a namespace listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub key: String,
    pub value: Value,
}

/// Storage, schema validation and change events behind one API
#[derive(Debug, Clone)]
pub struct DocumentService {
    storage: Arc<dyn Storage>,
    validator: SchemaValidator,
    broker: Broker,
}

fn check_name(name: &str) -> ServiceResult<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(ServiceError::InvalidName(name.to_string()))
    }
}

impl DocumentService {
    pub fn new(storage: Arc<dyn Storage>, broker: Broker) -> Self {
        Self {
            validator: SchemaValidator::new(storage.clone()),
            storage,
            broker,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    // ==================
    // Documents
    // ==================

    /// Validate and store `body` at `namespace/key`. Returns the parsed
    /// document; the stored bytes are exactly `body`.
    pub async fn upsert(&self, namespace: &str, key: &str, body: &[u8]) -> ServiceResult<Value> {
        check_name(namespace)?;
        check_name(key)?;

        let document = self.validator.validate(namespace, body).await?;
        self.storage.upsert(namespace, key, body).await?;

        let dispatch = self
            .broker
            .publish(ChangeEvent::item_added(namespace, key, document.clone()));
        debug!(namespace, key, sequence = dispatch.sequence, "document stored");
        Ok(document)
    }

    /// Stored bytes for `namespace/key`
    pub async fn get(&self, namespace: &str, key: &str) -> ServiceResult<Vec<u8>> {
        check_name(namespace)?;
        check_name(key)?;
        Ok(self.storage.get(namespace, key).await?)
    }

    /// Every document of `namespace`, parsed, in ascending key order
    pub async fn get_all(&self, namespace: &str) -> ServiceResult<Vec<Entry>> {
        check_name(namespace)?;
        let documents = self.storage.get_all(namespace).await?;

        documents
            .into_iter()
            .map(|(key, raw)| match serde_json::from_slice(&raw) {
                Ok(value) => Ok(Entry { key, value }),
                Err(e) => Err(ServiceError::MalformedDocument {
                    key,
                    reason: e.to_string(),
                }),
            })
            .collect()
    }

    pub async fn delete(&self, namespace: &str, key: &str) -> ServiceResult<()> {
        check_name(namespace)?;
        check_name(key)?;
        self.storage.delete(namespace, key).await?;
        self.broker.publish(ChangeEvent::item_deleted(namespace, key));
        Ok(())
    }

    /// Drop a namespace and its documents. Its schema, if any, is kept.
    pub async fn delete_all(&self, namespace: &str) -> ServiceResult<()> {
        check_name(namespace)?;
        self.storage.delete_all(namespace).await?;
        self.broker.publish(ChangeEvent::namespace_deleted(namespace));
        info!(namespace, "namespace deleted");
        Ok(())
    }

    /// Data namespaces, without the ones holding schemas
    pub async fn list_namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .storage
            .list_namespaces()
            .await
            .into_iter()
            .filter(|name| !is_schema_namespace(name))
            .collect();
        names.sort();
        names
    }

    pub async fn search(&self, namespace: &str, filter: &str) -> ServiceResult<Vec<SearchHit>> {
        check_name(namespace)?;
        Ok(run_filter(self.storage.as_ref(), namespace, filter).await?)
    }

    // ==================
    // Schemas
    // ==================

    pub async fn put_schema(&self, namespace: &str, body: &[u8]) -> ServiceResult<Value> {
        check_name(namespace)?;
        Ok(self.validator.registry().put_schema(namespace, body).await?)
    }

    /// Stored schema bytes, or `None` when the namespace has none
    pub async fn get_schema(&self, namespace: &str) -> ServiceResult<Option<Vec<u8>>> {
        check_name(namespace)?;
        Ok(self.validator.registry().get_raw(namespace).await?)
    }

    pub async fn delete_schema(&self, namespace: &str) -> ServiceResult<()> {
        check_name(namespace)?;
        Ok(self.validator.registry().delete_schema(namespace).await?)
    }

    // ==================
    // Events
    // ==================

    pub fn subscribe(&self) -> Subscriber {
        self.broker.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::EventKind;
    use crate::schema::SchemaError;
    use crate::storage::{ErrorKind, MemoryBackend};
    use serde_json::json;

    fn service() -> DocumentService {
        DocumentService::new(Arc::new(MemoryBackend::new()), Broker::default())
    }

    #[tokio::test]
    async fn test_write_read_delete_publishes() {
        let service = service();
        let mut events = service.subscribe();

        let value = service.upsert("users", "1", br#"{"name":"john"}"#).await.unwrap();
        assert_eq!(value, json!({"name": "john"}));
        assert_eq!(service.get("users", "1").await.unwrap(), br#"{"name":"john"}"#.to_vec());

        service.delete("users", "1").await.unwrap();
        service.delete_all("users").await.unwrap();

        let kinds: Vec<EventKind> = (0..3)
            .map(|_| events.try_recv().unwrap().event_kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::ItemAdded, EventKind::ItemDeleted, EventKind::NamespaceDeleted]
        );
    }

    #[tokio::test]
    async fn test_failed_writes_publish_nothing() {
        let service = service();
        let mut events = service.subscribe();

        assert!(service.upsert("users", "1", b"not json").await.is_err());
        assert!(service.delete("users", "1").await.is_err());
        assert!(service.delete_all("users").await.is_err());
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_invalid_names() {
        let service = service();
        let err = service.upsert("bad-name", "1", b"{}").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidName(_)));
        assert!(service.get("users", "a_b").await.is_err());
        assert!(service.list_namespaces().await.is_empty());
    }

    #[tokio::test]
    async fn test_schema_enforced_and_hidden() {
        let service = service();
        service
            .put_schema("users", br#"{"type":"object","required":["lastName"]}"#)
            .await
            .unwrap();

        let err = service.upsert("users", "1", br#"{"a":1}"#).await.unwrap_err();
        match err {
            ServiceError::Schema(SchemaError::Violation(details)) => {
                assert_eq!(details.to_string(), "(root): lastName is required")
            }
            other => panic!("unexpected {:?}", other),
        }

        service.upsert("users", "1", br#"{"lastName":"Doe"}"#).await.unwrap();
        assert_eq!(service.list_namespaces().await, vec!["users"]);

        // Dropping the namespace keeps the schema
        service.delete_all("users").await.unwrap();
        assert!(service.get_schema("users").await.unwrap().is_some());
        assert!(service.upsert("users", "2", br#"{"a":1}"#).await.is_err());

        service.delete_schema("users").await.unwrap();
        assert!(service.upsert("users", "2", br#"{"a":1}"#).await.is_ok());
    }

    #[tokio::test]
    async fn test_listing_sorted_and_search() {
        let service = service();
        service.upsert("people", "2", br#"{"name":"john"}"#).await.unwrap();
        service.upsert("people", "1", br#"{"name":"jane"}"#).await.unwrap();

        let entries = service.get_all("people").await.unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "2"]);

        let hits = service
            .search("people", r#"select(.name == "john")"#)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "2");

        let err = service.get_all("ghost").await.unwrap_err();
        match err {
            ServiceError::Storage(e) => assert_eq!(e.kind(), ErrorKind::NamespaceNotFound),
            other => panic!("unexpected {:?}", other),
        }
    }
}
