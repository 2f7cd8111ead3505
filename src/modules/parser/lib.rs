//! Configuration parsing for Querygate
//!
//! This crate handles parsing of YAML configuration files, validation, and
//! environment variable substitution.

pub mod env;
pub mod validator;
pub mod yaml;

pub use validator::ConfigValidator;
pub use yaml::YamlParser;

use querygate_core::{GatewayConfig, GatewayError};
use tracing::debug;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "querygate.yaml";

/// Parse a configuration file from a path
pub fn parse_file(path: &str) -> Result<GatewayConfig, GatewayError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| GatewayError::Config(format!("Failed to read file '{}': {}", path, e)))?;
    debug!("Loaded configuration from {}", path);

    parse_string(&content)
}

/// Parse a configuration from a string
pub fn parse_string(content: &str) -> Result<GatewayConfig, GatewayError> {
    let config = YamlParser::parse(content)?;

    let validator = ConfigValidator::new();
    validator.validate(&config)?;

    Ok(config)
}
