//! Capability manifests

use querygate_types::{Product, QueryKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ConnectionParams;
use crate::error::{GatewayError, Result};

/// Declares what a stored credential must contain and what queries it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityManifest {
    #[serde(default)]
    pub required_connection_params: BTreeSet<String>,
    pub supported_query_kind: QueryKind,
    #[serde(default)]
    pub default_query_example: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CapabilityManifest {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            required_connection_params: BTreeSet::new(),
            supported_query_kind: kind,
            default_query_example: String::new(),
            description: None,
        }
    }

    pub fn require<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_connection_params
            .extend(params.into_iter().map(Into::into));
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.default_query_example = example.into();
        self
    }

    /// Built-in manifest for a catalogue product.
    pub fn for_product(product: Product) -> Self {
        let mut manifest = Self::new(product.query_kind())
            .require(product.required_params().iter().copied())
            .example(product.example_query());
        manifest.description = Some(product.description().to_string());
        manifest
    }

    /// Required keys absent (or blank) in `params`, in sorted order.
    pub fn missing_params(&self, params: &ConnectionParams) -> Vec<String> {
        self.required_connection_params
            .iter()
            .filter(|key| !params.contains(key))
            .cloned()
            .collect()
    }

    /// Fails with a validation error listing every missing key.
    pub fn check(&self, product_name: &str, params: &ConnectionParams) -> Result<()> {
        let missing = self.missing_params(params);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::Validation(format!(
                "Missing required fields for {}: {}",
                product_name,
                missing.join(", ")
            )))
        }
    }
}
