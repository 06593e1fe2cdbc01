//! repotracker CLI entry point
//!
//! Parses arguments, sets up logging, runs the tracker and renders run-fatal errors.

use anyhow::Result;
use clap::Parser;
use repotracker::cli::Cli;
use repotracker::core::user_friendly_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    init_logging(cli.log_filter());

    match cli.execute().await {
        Ok(_) => Ok(()),
        Err(e) => {
            // Convert to user-friendly error with context and suggestions
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr; `RUST_LOG` wins over the verbosity flags.
fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
