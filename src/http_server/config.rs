//! HTTP Server Configuration
//!
//! Bind address, CORS origins and request body limit.

use serde::{Deserialize, Serialize};

/// Largest accepted request body, 1 MiB
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            body_limit: default_body_limit(),
        }
    }
}

impl HttpServerConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Parse a `host:port` address, as given on the command line
    pub fn from_address(address: &str) -> Option<Self> {
        let (host, port) = address.rsplit_once(':')?;
        let port = port.parse().ok()?;
        let host = if host.is_empty() { default_host() } else { host.to_string() };
        Some(Self {
            host,
            port,
            ..Default::default()
        })
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL advertised in the OpenAPI document
    pub fn public_url(&self) -> String {
        let host = if self.host == "0.0.0.0" { "localhost" } else { self.host.as_str() };
        format!("http://{}:{}", host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.body_limit, 1_048_576);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let config = HttpServerConfig::with_port(8080);
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
        assert_eq!(config.public_url(), "http://localhost:8080");
    }

    #[test]
    fn test_from_address() {
        let config = HttpServerConfig::from_address(":8000").unwrap();
        assert_eq!(config.socket_addr(), "0.0.0.0:8000");
        let config = HttpServerConfig::from_address("127.0.0.1:9000").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert!(HttpServerConfig::from_address("nonsense").is_none());
        assert!(HttpServerConfig::from_address("host:port").is_none());
    }
}
