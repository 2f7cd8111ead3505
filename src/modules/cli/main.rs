//! Querygate CLI
//!
//! Command-line interface for the Querygate query gateway.

use clap::Parser;
use querygate_cli::{Cli, Commands, LogFormat};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }

    match cli.command {
        Commands::Run(cmd) => cmd.execute(&config_path).await?,
        Commands::Seed(cmd) => cmd.execute(&config_path).await?,
        Commands::Credentials(cmd) => cmd.execute(&config_path).await?,
    }

    Ok(())
}
