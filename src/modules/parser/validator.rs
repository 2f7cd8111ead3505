//! Configuration validation

use once_cell::sync::Lazy;
use querygate_core::{GatewayConfig, GatewayError};
use querygate_types::Product;
use regex::Regex;
use std::collections::HashSet;
use std::str::FromStr;

/// Regex pattern for valid names (lower-kebab-case or lower_snake_case)
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:[-_][a-z0-9]+)*$").expect("Invalid regex"));

/// Configuration validator
pub struct ConfigValidator {
    /// Whether to validate names strictly
    strict_names: bool,
}

impl ConfigValidator {
    /// Create a new validator with default settings
    pub fn new() -> Self {
        Self { strict_names: true }
    }

    /// Create a validator with lenient name checking
    pub fn lenient() -> Self {
        Self {
            strict_names: false,
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self, config: &GatewayConfig) -> Result<(), GatewayError> {
        self.validate_name(&config.name)?;
        self.validate_server(config)?;
        self.validate_seeds(config)?;
        Ok(())
    }

    fn validate_name(&self, name: &str) -> Result<(), GatewayError> {
        if name.is_empty() {
            return Err(GatewayError::Validation(
                "Service name cannot be empty".to_string(),
            ));
        }

        if self.strict_names && !NAME_PATTERN.is_match(name) {
            return Err(GatewayError::Validation(format!(
                "Invalid service name '{}': must be lower-kebab-case or lower_snake_case",
                name
            )));
        }

        Ok(())
    }

    fn validate_server(&self, config: &GatewayConfig) -> Result<(), GatewayError> {
        if let Some(port) = &config.server.port {
            match port.trim().parse::<u16>() {
                Ok(p) if p > 0 => {}
                _ => {
                    return Err(GatewayError::Validation(format!(
                        "Invalid server port '{}'",
                        port
                    )))
                }
            }
        }

        if config.server.request_timeout_secs == Some(0) {
            return Err(GatewayError::Validation(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if config.store.path().trim().is_empty() {
            return Err(GatewayError::Validation(
                "Store path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Every seed names a known product, has non-empty ids and a unique key.
    fn validate_seeds(&self, config: &GatewayConfig) -> Result<(), GatewayError> {
        let mut keys = HashSet::new();

        for seed in &config.seeds {
            if Product::from_str(&seed.product).is_err() {
                return Err(GatewayError::Validation(format!(
                    "Seed '{}' names an unknown product",
                    seed.product
                )));
            }

            if seed.owner_id.trim().is_empty() || seed.connection_id.trim().is_empty() {
                return Err(GatewayError::Validation(format!(
                    "Seed for '{}' needs both owner_id and connection_id",
                    seed.product
                )));
            }

            let key = seed.key();
            if !keys.insert(key.clone()) {
                return Err(GatewayError::Validation(format!(
                    "Duplicate seed: '{}'",
                    key
                )));
            }
        }

        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querygate_core::{ConnectionParams, CredentialSeed};
    use querygate_types::Category;

    fn seed(product: &str, owner: &str) -> CredentialSeed {
        CredentialSeed {
            category: Category::Db,
            owner_id: owner.to_string(),
            connection_id: "conn_001".to_string(),
            product: product.to_string(),
            params: ConnectionParams::new(),
            manifest: None,
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = GatewayConfig::new("my-gateway");
        config.seeds = vec![seed("postgresql", "user_001"), seed("mysql", "user_001")];
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_name() {
        let config = GatewayConfig::new("My Gateway");
        assert!(ConfigValidator::new().validate(&config).is_err());
        assert!(ConfigValidator::lenient().validate(&config).is_ok());
        assert!(ConfigValidator::lenient()
            .validate(&GatewayConfig::new(""))
            .is_err());
    }

    #[test]
    fn test_invalid_port() {
        let mut config = GatewayConfig::new("gateway");
        config.server.port = Some("http".to_string());
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid server port"));
    }

    #[test]
    fn test_unknown_seed_product() {
        let mut config = GatewayConfig::new("gateway");
        config.seeds = vec![seed("salesforce", "user_001")];
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_seed() {
        let mut config = GatewayConfig::new("gateway");
        // Product names are case-insensitive in keys
        config.seeds = vec![seed("postgresql", "user_001"), seed("PostgreSQL", "user_001")];
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate seed"));
    }
}
