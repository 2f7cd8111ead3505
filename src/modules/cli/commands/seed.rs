//! Seed command implementation

use clap::Args;
use querygate_core::{CredentialKey, CredentialSeed, GatewayError};
use querygate_runtime::CredentialStore;
use tracing::{info, warn};

use super::load_config;

/// Seed command arguments
#[derive(Args, Debug)]
pub struct SeedCommand {
    /// Override the credential store path
    #[arg(long)]
    pub store: Option<String>,
}

/// Outcome of one seeding pass.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub stored: Vec<CredentialKey>,
    pub skipped: Vec<(CredentialKey, String)>,
}

impl SeedCommand {
    /// Execute the seed command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<()> {
        let config = load_config(config_path, self.store.as_deref())?;
        let store = CredentialStore::open(config.store.path()).await?;

        let report = seed_store(&store, &config.seeds).await;
        for key in &report.stored {
            println!("stored   {}", key);
        }
        for (key, reason) in &report.skipped {
            println!("skipped  {}: {}", key, reason);
        }
        println!(
            "{} stored, {} skipped ({})",
            report.stored.len(),
            report.skipped.len(),
            config.store.path()
        );
        Ok(())
    }
}

/// Upsert every seed; a failing seed is recorded and the rest still load.
pub async fn seed_store(store: &CredentialStore, seeds: &[CredentialSeed]) -> SeedReport {
    let mut report = SeedReport::default();

    for seed in seeds {
        let key = seed.key();
        let result = match seed.resolved_manifest() {
            Some(manifest) => store.upsert(key.clone(), seed.params.clone(), manifest).await,
            None => Err(GatewayError::Validation(format!(
                "no manifest for unknown product {}",
                seed.product
            ))),
        };
        match result {
            Ok(()) => {
                info!(key = %key, "Seeded credential");
                report.stored.push(key);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Skipping seed");
                report.skipped.push((key, e.sanitized_message()));
            }
        }
    }

    report
}
