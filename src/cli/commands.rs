//! CLI command implementations
//!
//! `serve` opens the configured backend, wires the broker and service and
//! runs the HTTP server until Ctrl-C. `namespaces` opens the backend and
//! prints what it holds.

use std::fs;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::http_server::{HttpServer, HttpServerConfig, JwtVerifier};
use crate::realtime::Broker;
use crate::service::DocumentService;
use crate::storage::{open_storage, Storage};

use super::args::{Cli, Command, ServeArgs, StorageArgs};
use super::errors::{CliError, CliResult};
use super::io::write_json;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,docbrew=debug";

/// Install the global tracing subscriber
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Parse arguments and run the selected command
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_tracing();
    run_command(cli.command).await
}

/// Run a parsed command
pub async fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve(args) => serve(args).await,
        Command::Namespaces { storage } => namespaces(&storage).await,
    }
}

async fn open(args: &StorageArgs) -> CliResult<Arc<dyn Storage>> {
    open_storage(&args.storage_config()).await.map_err(|e| {
        error!(error = %e, "unable to initialize storage");
        CliError::from(e)
    })
}

/// Build the server described by `args` without binding it
pub async fn build_server(args: &ServeArgs) -> CliResult<HttpServer> {
    let mut config = HttpServerConfig::from_address(&args.address)
        .ok_or_else(|| CliError::config_error(format!("invalid address: {}", args.address)))?;
    config.cors_origins = args.cors_origins.clone();

    let verifier = match &args.jwt_public_key {
        Some(path) => {
            let pem = fs::read(path).map_err(|e| {
                CliError::config_error(format!("unable to read {}: {}", path.display(), e))
            })?;
            info!(key = %path.display(), "jwt authentication enabled");
            Some(JwtVerifier::from_rsa_pem(&pem)?)
        }
        None => None,
    };

    let storage = open(&args.storage).await?;
    let broker = Broker::new(args.broker_config());
    let service = DocumentService::new(storage, broker);

    Ok(HttpServer::with_auth(config, service, verifier))
}

/// Start the HTTP server
pub async fn serve(args: ServeArgs) -> CliResult<()> {
    let server = build_server(&args).await?;
    server.start().await?;
    info!("server stopped");
    Ok(())
}

/// Print the namespaces of the configured backend as a JSON array
pub async fn namespaces(args: &StorageArgs) -> CliResult<()> {
    let storage = open(args).await?;
    let broker = Broker::default();
    let service = DocumentService::new(storage, broker);
    write_json(&service.list_namespaces().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn serve_args(extra: &[&str]) -> ServeArgs {
        let mut argv = vec!["docbrew", "serve"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Serve(args) => args,
            _ => panic!("expected serve"),
        }
    }

    #[tokio::test]
    async fn test_build_server_memory() {
        let server = build_server(&serve_args(&["--address", "127.0.0.1:0"]))
            .await
            .unwrap();
        assert_eq!(server.socket_addr(), "127.0.0.1:0");
    }

    #[tokio::test]
    async fn test_bad_address_rejected() {
        let err = build_server(&serve_args(&["--address", "nowhere"]))
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "DOCBREW_CLI_CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_missing_key_file_rejected() {
        let err = build_server(&serve_args(&["--jwt-public-key", "/nonexistent/key.pem"]))
            .await
            .unwrap_err();
        assert_eq!(err.code_str(), "DOCBREW_CLI_CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_unreachable_storage_fails_boot() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();

        let args = serve_args(&["--db", "fs", "--fs-root", file.to_str().unwrap()]);
        let err = build_server(&args).await.unwrap_err();
        assert_eq!(err.code_str(), "DOCBREW_CLI_BOOT_FAILED");
    }
}
