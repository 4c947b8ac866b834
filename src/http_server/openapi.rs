//! OpenAPI document
//!
//! An OpenAPI 3.0.1 description generated from the namespaces that exist
//! right now: one `/ns/<namespace>/{id}` path per namespace.

use axum::{extract::State, Json};
use serde_json::{json, Map, Value};

use super::errors::ApiError;
use super::routes::AppState;

fn id_parameter() -> Value {
    json!([{
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string" }
    }])
}

fn document_path() -> Value {
    json!({
        "get": {
            "parameters": id_parameter(),
            "responses": {
                "default": { "description": "default response", "content": {} },
                "200": { "description": "200 OK", "content": { "application/json": {} } },
                "404": { "description": "404 Not Found", "content": {} }
            }
        },
        "post": {
            "parameters": id_parameter(),
            "requestBody": {
                "content": { "application/json": { "schema": {} } }
            },
            "responses": {
                "default": { "description": "default response", "content": {} },
                "201": { "description": "201 Created", "content": { "application/json": {} } }
            }
        },
        "delete": {
            "parameters": id_parameter(),
            "responses": {
                "default": { "description": "default response", "content": {} },
                "202": { "description": "202 Accepted", "content": { "application/json": {} } },
                "404": { "description": "404 Not Found", "content": {} }
            }
        }
    })
}

/// Build the document for `namespaces`
pub fn openapi_document(namespaces: &[String], server_url: &str) -> Value {
    let paths: Map<String, Value> = namespaces
        .iter()
        .map(|ns| (format!("/ns/{}/{{id}}", ns), document_path()))
        .collect();

    json!({
        "openapi": "3.0.1",
        "info": {
            "title": "docbrew",
            "description": "Namespaced JSON document store",
            "version": env!("CARGO_PKG_VERSION")
        },
        "servers": [{ "url": server_url }],
        "paths": paths
    })
}

pub(crate) async fn openapi_handler(State(state): State<AppState>) -> Json<Value> {
    let namespaces = state.service.list_namespaces().await;
    Json(openapi_document(&namespaces, &state.public_url))
}

pub(crate) async fn openapi_unsupported_handler() -> ApiError {
    ApiError::not_implemented("cannot modify this endpoint!")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_per_namespace() {
        let doc = openapi_document(&["users".into(), "orders".into()], "http://localhost:8000");
        assert_eq!(doc["openapi"], "3.0.1");
        assert_eq!(doc["servers"][0]["url"], "http://localhost:8000");

        let paths = doc["paths"].as_object().unwrap();
        assert_eq!(paths.len(), 2);
        let users = &paths["/ns/users/{id}"];
        assert!(users["get"].is_object());
        assert!(users["post"]["requestBody"].is_object());
        assert!(users["delete"]["responses"]["202"].is_object());
    }

    #[test]
    fn test_empty_store() {
        let doc = openapi_document(&[], "http://localhost:8000");
        assert!(doc["paths"].as_object().unwrap().is_empty());
    }
}
