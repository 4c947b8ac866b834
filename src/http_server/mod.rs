//! # HTTP Server Module
//!
//! REST surface of the document store.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/ns`, `/ns/:namespace`, `/ns/:namespace/:key` - Documents
//! - `/search/:namespace?filter=` - Query a namespace
//! - `/schema/:namespace` - JSON Schema per namespace
//! - `/openapi.json`, `/swagger.json` - Generated OpenAPI document
//! - `/broker` - WebSocket stream of change events

pub mod auth;
pub mod broker_routes;
pub mod config;
pub mod errors;
pub mod openapi;
pub mod routes;
pub mod server;

pub use auth::{AccessClaims, AuthError, JwtVerifier};
pub use config::HttpServerConfig;
pub use errors::{ApiError, ErrorResponse};
pub use openapi::openapi_document;
pub use routes::AppState;
pub use server::HttpServer;
