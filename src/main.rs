use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod core;
mod config;
mod error;

use crate::cli::Cli;
use crate::core::Engine;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting docgraph v{}", env!("CARGO_PKG_VERSION"));

    let engine = Engine::new(cli.config.as_deref())?;

    cli.execute(engine)
}
