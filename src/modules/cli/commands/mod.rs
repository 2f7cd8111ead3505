//! CLI commands

mod credentials;
mod run;
mod seed;

pub use credentials::{CredentialsCommand, CredentialsSubcommand};
pub use run::RunCommand;
pub use seed::{SeedCommand, SeedReport};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use querygate_core::GatewayConfig;
use querygate_parser::DEFAULT_CONFIG_FILE;

/// Querygate - one query surface over many backends
#[derive(Parser, Debug)]
#[command(name = "querygate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short = 'f', long = "file", global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Querygate server
    Run(RunCommand),

    /// Upsert every configured seed into the credential store
    Seed(SeedCommand),

    /// Inspect or remove stored credentials
    Credentials(CredentialsCommand),
}

/// Load and validate the configuration, applying a store path override.
pub(crate) fn load_config(path: &str, store_override: Option<&str>) -> anyhow::Result<GatewayConfig> {
    let mut config = querygate_parser::parse_file(path)
        .with_context(|| format!("loading configuration from {}", path))?;
    if let Some(store) = store_override {
        config.store.path = Some(store.to_string());
    }
    Ok(config)
}
