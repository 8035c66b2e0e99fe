#![allow(clippy::exit, clippy::print_stderr, clippy::print_stdout)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use marketplace_dashboard::{Cli, execute};
use marketplace_records::{RecordStoreConfig, RestRecordStore, SharedRecordStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = RecordStoreConfig::from_env().context("record store configuration")?;
    tracing::debug!(base_url = %config.base_url, "record store configured");
    let store: SharedRecordStore =
        Arc::new(RestRecordStore::new(config).context("record store client")?);
    let output = execute(cli.command, store).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
