//! CLI argument definitions using clap
//!
//! Commands:
//! - docbrew serve [--address :8000] [--db memory|fs|postgres|sqlite] ...
//! - docbrew namespaces [--db ...]
//!
//! Every flag falls back to an environment variable.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::realtime::{BrokerConfig, DEFAULT_QUEUE_CAPACITY};
use crate::storage::{PostgresConfig, SqliteConfig, StorageConfig};

/// docbrew - a namespaced JSON document store
#[derive(Parser, Debug)]
#[command(name = "docbrew")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Print the namespaces held by a backend and exit
    Namespaces {
        #[command(flatten)]
        storage: StorageArgs,
    },
}

/// Backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DbType {
    Memory,
    Fs,
    Postgres,
    Sqlite,
}

/// Backend selection and parameters
#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// Backend to use
    #[arg(long = "db", env = "DB_TYPE", value_enum, default_value_t = DbType::Memory)]
    pub db_type: DbType,

    /// Root directory of the filesystem backend
    #[arg(long, env = "FS_ROOT", default_value = "./data")]
    pub fs_root: PathBuf,

    /// Directory holding the SQLite database file
    #[arg(long, env = "SQLITE_DIR", default_value = ".")]
    pub sqlite_dir: PathBuf,

    /// Full postgres connection URL; overrides the individual pg flags
    #[arg(long, env = "PG_URL")]
    pub pg_url: Option<String>,

    #[arg(long, env = "PG_HOST", default_value = "0.0.0.0")]
    pub pg_host: String,

    #[arg(long, env = "PG_PORT", default_value_t = 5432)]
    pub pg_port: u16,

    #[arg(long, env = "PG_USER", default_value = "")]
    pub pg_user: String,

    #[arg(long, env = "PG_PASS", default_value = "", hide_env_values = true)]
    pub pg_pass: String,

    #[arg(long, env = "PG_DATABASE")]
    pub pg_database: Option<String>,

    /// Seconds to wait for a backend connection
    #[arg(long, env = "DB_CONNECT_TIMEOUT", default_value_t = 5)]
    pub connect_timeout: u64,
}

impl StorageArgs {
    pub fn storage_config(&self) -> StorageConfig {
        match self.db_type {
            DbType::Memory => StorageConfig::Memory,
            DbType::Fs => StorageConfig::Filesystem {
                root: self.fs_root.clone(),
            },
            DbType::Postgres => StorageConfig::Postgres(PostgresConfig {
                url: self.pg_url.clone(),
                host: self.pg_host.clone(),
                port: self.pg_port,
                user: self.pg_user.clone(),
                password: self.pg_pass.clone(),
                database: self.pg_database.clone(),
                connect_timeout: Duration::from_secs(self.connect_timeout),
                ..Default::default()
            }),
            DbType::Sqlite => {
                let mut config = SqliteConfig::new(self.sqlite_dir.clone());
                config.busy_timeout = Duration::from_secs(self.connect_timeout);
                StorageConfig::Sqlite(config)
            }
        }
    }
}

/// Arguments of `docbrew serve`
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// ip:port to expose
    #[arg(long, env = "IP_PORT", default_value = ":8000")]
    pub address: String,

    #[command(flatten)]
    pub storage: StorageArgs,

    /// Events buffered per broker subscriber before it is dropped
    #[arg(long, env = "BROKER_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// PEM file with the RSA public key verifying access tokens; auth is off when unset
    #[arg(long, env = "JWT_PUBLIC_KEY")]
    pub jwt_public_key: Option<PathBuf>,

    /// Allowed CORS origins, comma separated; any origin when empty
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

impl ServeArgs {
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            queue_capacity: self.queue_capacity.max(1),
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["docbrew", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.address, ":8000");
        assert_eq!(args.storage.db_type, DbType::Memory);
        assert!(args.jwt_public_key.is_none());
        assert!(matches!(args.storage.storage_config(), StorageConfig::Memory));
    }

    #[test]
    fn test_backend_flags() {
        let cli = Cli::try_parse_from([
            "docbrew", "serve", "--db", "fs", "--fs-root", "/tmp/docs", "--queue-capacity", "0",
        ])
        .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        match args.storage.storage_config() {
            StorageConfig::Filesystem { root } => assert_eq!(root, PathBuf::from("/tmp/docs")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(args.broker_config().queue_capacity, 1);
    }

    #[test]
    fn test_postgres_flags() {
        let cli = Cli::try_parse_from([
            "docbrew", "namespaces", "--db", "postgres", "--pg-user", "bob", "--pg-pass", "pw",
        ])
        .unwrap();
        let Command::Namespaces { storage } = cli.command else {
            panic!("expected namespaces");
        };
        match storage.storage_config() {
            StorageConfig::Postgres(config) => {
                assert_eq!(config.user, "bob");
                assert_eq!(config.password, "pw");
                assert_eq!(config.port, 5432);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
