//! # Search
//!
//! Runs a compiled filter over every document of a namespace. Each output
//! becomes a `{key, value}` hit. A filter that fails to compile is reported
//! before storage is touched; a malformed stored document or a runtime
//! error aborts the whole search.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::ast::Expr;
use super::errors::{QueryError, QueryResult, SearchError};
use super::eval;
use super::parser;
use crate::storage::Storage;

/// A compiled filter
#[derive(Debug, Clone)]
pub struct Filter {
    source: String,
    expr: Expr,
}

impl Filter {
    pub fn parse(source: &str) -> QueryResult<Self> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse(source)?,
        })
    }

    /// All outputs for one input document
    pub fn apply(&self, input: &Value) -> QueryResult<Vec<Value>> {
        eval::run(&self.expr, input)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for Filter {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// One filter output, tagged with the key of the document it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub key: String,
    pub value: Value,
}

/// Evaluate `filter` over every document in `namespace`.
///
/// Hits are ordered by document key, then by output order within a
/// document. An empty result is not an error.
pub async fn run_filter(
    storage: &dyn Storage,
    namespace: &str,
    filter: &str,
) -> Result<Vec<SearchHit>, SearchError> {
    let filter = Filter::parse(filter).map_err(|e| {
        debug!(namespace, error = %e, "filter rejected");
        e
    })?;
    let documents = storage.get_all(namespace).await?;

    let mut hits = Vec::new();
    for (key, raw) in documents {
        let document: Value =
            serde_json::from_slice(&raw).map_err(|e| SearchError::MalformedDocument {
                key: key.clone(),
                reason: e.to_string(),
            })?;
        let outputs = filter.apply(&document).map_err(|e| {
            warn!(namespace, key = %key, filter = %filter, error = %e, "filter failed");
            e
        })?;
        hits.extend(outputs.into_iter().map(|value| SearchHit {
            key: key.clone(),
            value,
        }));
    }

    debug!(namespace, filter = %filter, hits = hits.len(), "search complete");
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ErrorKind, MemoryBackend};
    use serde_json::json;

    async fn people() -> MemoryBackend {
        let storage = MemoryBackend::new();
        storage
            .upsert("people", "1", br#"{"name":"jane","age":30}"#)
            .await
            .unwrap();
        storage
            .upsert("people", "2", br#"{"name":"john","age":40}"#)
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn test_select_by_field() {
        let storage = people().await;
        let hits = run_filter(&storage, "people", r#"select(.name == "john")"#)
            .await
            .unwrap();
        assert_eq!(
            hits,
            vec![SearchHit {
                key: "2".into(),
                value: json!({"name": "john", "age": 40}),
            }]
        );
    }

    #[tokio::test]
    async fn test_multiple_outputs_and_empty() {
        let storage = people().await;
        let hits = run_filter(&storage, "people", ".name, .age").await.unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].key, "1");
        assert_eq!(hits[1].value, json!(30));

        let hits = run_filter(&storage, "people", "select(.age > 100)").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_before_storage() {
        // The namespace does not exist, but the filter is checked first
        let storage = MemoryBackend::new();
        let err = run_filter(&storage, "ghost", "select(").await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = run_filter(&storage, "ghost", ".").await.unwrap_err();
        match err {
            SearchError::Storage(e) => assert_eq!(e.kind(), ErrorKind::NamespaceNotFound),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fail_fast() {
        let storage = people().await;
        storage.upsert("people", "3", b"not json").await.unwrap();
        let err = run_filter(&storage, "people", ".").await.unwrap_err();
        assert!(matches!(err, SearchError::MalformedDocument { ref key, .. } if key == "3"));

        let storage = people().await;
        let err = run_filter(&storage, "people", ".name | length > .x")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_hit_serialization() {
        let hit = SearchHit {
            key: "k".into(),
            value: json!({"a": 1}),
        };
        assert_eq!(serde_json::to_value(&hit).unwrap(), json!({"key": "k", "value": {"a": 1}}));
    }
}
