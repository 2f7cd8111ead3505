//! Run command implementation

use clap::Args;
use querygate_runtime::Runtime;
use tracing::info;

use super::load_config;

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Override server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the credential store path
    #[arg(long)]
    pub store: Option<String>,
}

impl RunCommand {
    /// Execute the run command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<()> {
        info!("Loading configuration from: {}", config_path);
        let config = load_config(config_path, self.store.as_deref())?;

        let runtime = Runtime::with_port_override(config, self.port).await?;
        runtime.run().await?;

        Ok(())
    }
}
