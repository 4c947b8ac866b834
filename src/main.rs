//! docbrew entry point
//!
//! Parses arguments, runs the command and exits non-zero on failure. All
//! logic lives in the CLI module.

use docbrew::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
