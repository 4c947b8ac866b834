//! Document HTTP Routes
//!
//! Namespaces, documents, search and schemas.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::errors::ApiError;
use super::openapi::{openapi_handler, openapi_unsupported_handler};
use crate::query::SearchHit;
use crate::service::{DocumentService, Entry};

// ==================
// Shared State
// ==================

/// State shared by the document handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: DocumentService,
    /// Base URL advertised in the OpenAPI document
    pub public_url: String,
}

impl AppState {
    pub fn new(service: DocumentService, public_url: impl Into<String>) -> Self {
        Self {
            service,
            public_url: public_url.into(),
        }
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
}

// ==================
// Routes
// ==================

/// Create document, search, schema and OpenAPI routes
pub fn document_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ns", get(list_namespaces_handler))
        .route(
            "/ns/:namespace",
            get(get_namespace_handler)
                .post(post_namespace_handler)
                .delete(delete_namespace_handler),
        )
        .route(
            "/ns/:namespace/:key",
            get(get_document_handler)
                .post(upsert_document_handler)
                .delete(delete_document_handler),
        )
        .route("/search/:namespace", get(search_handler))
        .route(
            "/schema/:namespace",
            get(get_schema_handler)
                .post(put_schema_handler)
                .delete(delete_schema_handler),
        )
        .route(
            "/openapi.json",
            get(openapi_handler)
                .post(openapi_unsupported_handler)
                .delete(openapi_unsupported_handler),
        )
        .route(
            "/swagger.json",
            get(openapi_handler)
                .post(openapi_unsupported_handler)
                .delete(openapi_unsupported_handler),
        )
        .with_state(state)
}

/// Respond with stored JSON bytes as-is
fn raw_json(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn accepted() -> Response {
    (StatusCode::ACCEPTED, Json(json!({}))).into_response()
}

// ==================
// Handlers
// ==================

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.service.storage().kind().to_string(),
    };
    (StatusCode::OK, Json(response))
}

async fn list_namespaces_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.service.list_namespaces().await)
}

async fn get_namespace_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    Ok(Json(state.service.get_all(&namespace).await?))
}

async fn post_namespace_handler() -> ApiError {
    ApiError::not_implemented("cannot POST to this endpoint!")
}

async fn delete_namespace_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Response, ApiError> {
    state.service.delete_all(&namespace).await?;
    Ok(accepted())
}

async fn get_document_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let body = state.service.get(&namespace, &key).await?;
    Ok(raw_json(StatusCode::OK, body))
}

async fn upsert_document_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    state.service.upsert(&namespace, &key, &body).await?;
    Ok(raw_json(StatusCode::CREATED, body.to_vec()))
}

async fn delete_document_handler(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    state.service.delete(&namespace, &key).await?;
    Ok(accepted())
}

async fn search_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let filter = params
        .filter
        .ok_or_else(|| ApiError::bad_request("missing filter query parameter"))?;
    let results = state.service.search(&namespace, &filter).await?;
    Ok(Json(SearchResponse { results }))
}

async fn get_schema_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Response, ApiError> {
    match state.service.get_schema(&namespace).await? {
        Some(schema) => Ok(raw_json(StatusCode::OK, schema)),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("no schema for namespace {}", namespace),
        )),
    }
}

async fn put_schema_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    state.service.put_schema(&namespace, &body).await?;
    Ok(raw_json(StatusCode::CREATED, body.to_vec()))
}

async fn delete_schema_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Response, ApiError> {
    state.service.delete_schema(&namespace).await?;
    Ok(accepted())
}
