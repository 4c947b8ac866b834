//! CLI module for docbrew
//!
//! Provides command-line interface for:
//! - serve: Open a backend and serve the HTTP API
//! - namespaces: Print the namespaces of a backend

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, DbType, ServeArgs, StorageArgs};
pub use commands::{build_server, init_tracing, namespaces, run, run_command, serve, DEFAULT_LOG_FILTER};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_json, write_json_to};
