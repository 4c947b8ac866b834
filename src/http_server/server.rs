//! # HTTP Server
//!
//! Combines the document, OpenAPI and broker routers behind CORS, tracing,
//! a body size limit and, when configured, JWT authentication.

use std::future::Future;
use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, http::Method, middleware, Router};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::auth::{require_jwt, JwtVerifier};
use super::broker_routes::broker_routes;
use super::config::HttpServerConfig;
use super::routes::{document_routes, AppState};
use crate::realtime::Broker;
use crate::service::DocumentService;

/// HTTP server for the document store
#[derive(Debug)]
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
    broker: Broker,
}

impl HttpServer {
    /// Create a server without authentication
    pub fn new(config: HttpServerConfig, service: DocumentService) -> Self {
        Self::with_auth(config, service, None)
    }

    /// Create a server; every route requires a valid token when `verifier` is set
    pub fn with_auth(
        config: HttpServerConfig,
        service: DocumentService,
        verifier: Option<JwtVerifier>,
    ) -> Self {
        let broker = service.broker().clone();
        let router = Self::build_router(&config, service, verifier);
        Self {
            config,
            router,
            broker,
        }
    }

    /// Build the combined router with all endpoints
    pub fn build_router(
        config: &HttpServerConfig,
        service: DocumentService,
        verifier: Option<JwtVerifier>,
    ) -> Router {
        let broker = service.broker().clone();
        let state = AppState::new(service, config.public_url());

        let methods = [Method::GET, Method::POST, Method::DELETE];
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(methods)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(methods)
                .allow_headers(Any)
        };

        let mut router = Router::new()
            .merge(document_routes(state))
            .merge(broker_routes(broker));

        if let Some(verifier) = verifier {
            router = router.layer(middleware::from_fn_with_state(
                Arc::new(verifier),
                require_jwt,
            ));
        }

        router
            .layer(DefaultBodyLimit::max(config.body_limit))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> std::io::Result<()> {
        self.start_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Serve until `shutdown` resolves. Open broker streams are closed so
    /// in-flight websocket connections drain.
    pub async fn start_with_shutdown<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(%addr, "docbrew listening");
        info!(url = %self.config.public_url(), "openapi document at /openapi.json");

        let broker = self.broker;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("shutting down");
                broker.close_all();
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn service() -> DocumentService {
        DocumentService::new(Arc::new(MemoryBackend::new()), Broker::default())
    }

    #[test]
    fn test_server_with_custom_port() {
        let server = HttpServer::new(HttpServerConfig::with_port(8080), service());
        assert_eq!(server.socket_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_router_builds_with_auth() {
        let verifier =
            JwtVerifier::from_rsa_pem(include_bytes!("../../tests/fixtures/jwt_test_public.pem"))
                .unwrap();
        let server = HttpServer::with_auth(HttpServerConfig::default(), service(), Some(verifier));
        let _router = server.router();
    }
}
