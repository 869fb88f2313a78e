mod config;
mod views;

use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use parlor_client::{FileTokenStore, Session};

use crate::config::Cli;

pub const TRACING_TARGET_STARTUP: &str = "parlor_cli::startup";
pub const TRACING_TARGET_VIEW: &str = "parlor_cli::view";

#[tokio::main]
async fn main() {
    // Load .env if present, before clap reads its env fallbacks
    let _ = dotenvy::dotenv();

    let Err(error) = run().await else {
        process::exit(0);
    };

    tracing::debug!(
        target: TRACING_TARGET_STARTUP,
        error = ?error,
        "command failed"
    );
    eprintln!("Error: {error:#}");
    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.client.to_config()?;
    tracing::debug!(
        target: TRACING_TARGET_STARTUP,
        api_url = %config.api_url,
        socket_url = %config.socket_url,
        token_path = %config.token_path.display(),
        "client configuration"
    );

    let store = FileTokenStore::new(config.token_path.clone(), config.token_ttl);
    let mut session = Session::new(config, Arc::new(store))?;

    views::render(cli.command, &mut session).await
}

/// Logs go to stderr so they never interleave with view output on stdout.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "parlor=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
