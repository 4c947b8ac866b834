//! # Change Events
//!
//! One event per successful mutation, serialized for subscribers as
//!
//! ```json
//! {"sequence":1,"eventKind":"ITEM_ADDED","namespace":"users","key":"1","value":{},"timestamp":"..."}
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A document was created or replaced
    ItemAdded,
    ItemDeleted,
    /// A whole namespace was dropped
    NamespaceDeleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::ItemAdded => write!(f, "ITEM_ADDED"),
            EventKind::ItemDeleted => write!(f, "ITEM_DELETED"),
            EventKind::NamespaceDeleted => write!(f, "NAMESPACE_DELETED"),
        }
    }
}

/// A mutation notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Assigned by the broker at publish time; 0 until then
    pub sequence: u64,

    pub event_kind: EventKind,

    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// The stored document, for `ITEM_ADDED`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    fn new(
        event_kind: EventKind,
        namespace: impl Into<String>,
        key: Option<String>,
        value: Option<Value>,
    ) -> Self {
        Self {
            sequence: 0,
            event_kind,
            namespace: namespace.into(),
            key,
            value,
            timestamp: Utc::now(),
        }
    }

    pub fn item_added(namespace: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        Self::new(EventKind::ItemAdded, namespace, Some(key.into()), Some(value))
    }

    pub fn item_deleted(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(EventKind::ItemDeleted, namespace, Some(key.into()), None)
    }

    pub fn namespace_deleted(namespace: impl Into<String>) -> Self {
        Self::new(EventKind::NamespaceDeleted, namespace, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let event = ChangeEvent::item_added("users", "1", json!({"name": "john"}));
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["eventKind"], "ITEM_ADDED");
        assert_eq!(wire["namespace"], "users");
        assert_eq!(wire["key"], "1");
        assert_eq!(wire["value"], json!({"name": "john"}));
        assert!(wire["timestamp"].is_string());
    }

    #[test]
    fn test_optional_fields_omitted() {
        let wire = serde_json::to_value(ChangeEvent::namespace_deleted("users")).unwrap();
        assert_eq!(wire["eventKind"], "NAMESPACE_DELETED");
        assert!(wire.get("key").is_none());
        assert!(wire.get("value").is_none());

        let wire = serde_json::to_value(ChangeEvent::item_deleted("users", "7")).unwrap();
        assert_eq!(wire["eventKind"], "ITEM_DELETED");
        assert!(wire.get("value").is_none());
    }

    #[test]
    fn test_deserialize_round_trip() {
        let event = ChangeEvent::item_deleted("a", "b");
        let text = serde_json::to_string(&event).unwrap();
        let parsed: ChangeEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, event);
    }
}
