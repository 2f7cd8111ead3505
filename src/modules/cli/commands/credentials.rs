//! Credentials command implementation

use anyhow::Context;
use clap::{Args, Subcommand};
use querygate_core::{CredentialFilter, CredentialKey};
use querygate_runtime::CredentialStore;
use querygate_types::Category;
use std::str::FromStr;

use super::load_config;

/// Credentials command arguments
#[derive(Args, Debug)]
pub struct CredentialsCommand {
    /// Override the credential store path
    #[arg(long, global = true)]
    pub store: Option<String>,

    #[command(subcommand)]
    pub action: CredentialsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CredentialsSubcommand {
    /// List stored credential keys (parameters are never printed)
    List {
        /// Category to list (db, ss, app, ecom, doi)
        category: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        product: Option<String>,
    },

    /// Delete exactly one stored credential
    Delete {
        category: String,
        owner: String,
        connection: String,
        product: String,
    },
}

fn parse_category(raw: &str) -> anyhow::Result<Category> {
    Category::from_str(raw).map_err(anyhow::Error::msg)
}

impl CredentialsCommand {
    /// Execute the credentials command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<()> {
        let config = load_config(config_path, self.store.as_deref())?;
        let store = CredentialStore::open(config.store.path())
            .await
            .with_context(|| format!("opening credential store {}", config.store.path()))?;

        match &self.action {
            CredentialsSubcommand::List {
                category,
                owner,
                product,
            } => {
                let mut filter = CredentialFilter::new(parse_category(category)?);
                if let Some(owner) = owner {
                    filter = filter.owner(owner);
                }
                if let Some(product) = product {
                    filter = filter.product(product);
                }
                let records = store.list(&filter).await?;
                for record in &records {
                    println!("{}\t{}", record.key, record.manifest.supported_query_kind);
                }
                println!("{} credential(s)", records.len());
            }
            CredentialsSubcommand::Delete {
                category,
                owner,
                connection,
                product,
            } => {
                let key = CredentialKey::new(parse_category(category)?, owner, connection, product);
                store.delete(&key).await?;
                println!("deleted  {}", key);
            }
        }

        Ok(())
    }
}
