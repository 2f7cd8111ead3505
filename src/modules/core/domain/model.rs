//! Root gateway configuration

use querygate_types::{Category, Product};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::types::DEFAULT_PORT;
use super::{CapabilityManifest, ConnectionParams, CredentialKey, ServerConfig, StoreConfig};

/// Root configuration model that represents a `querygate.yaml` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Service name
    pub name: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    /// Credentials to load into the store with `querygate seed`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seeds: Vec<CredentialSeed>,
}

impl GatewayConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            seeds: Vec::new(),
        }
    }

    /// Get the server port, defaulting to 5000
    pub fn port(&self) -> u16 {
        self.server
            .port
            .as_ref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new("querygate")
    }
}

/// A credential declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSeed {
    pub category: Category,
    pub owner_id: String,
    pub connection_id: String,
    pub product: String,
    #[serde(default)]
    pub params: ConnectionParams,
    /// Defaults to the product's built-in manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<CapabilityManifest>,
}

impl CredentialSeed {
    pub fn key(&self) -> CredentialKey {
        CredentialKey::new(
            self.category,
            self.owner_id.clone(),
            self.connection_id.clone(),
            &self.product,
        )
    }

    /// Explicit manifest, else the catalogue default for a known product.
    pub fn resolved_manifest(&self) -> Option<CapabilityManifest> {
        self.manifest.clone().or_else(|| {
            Product::from_str(&self.product)
                .ok()
                .map(CapabilityManifest::for_product)
        })
    }
}
