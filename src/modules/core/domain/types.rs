//! Server and store configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_STORE_PATH: &str = "querygate_credentials.db";

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind (default: 0.0.0.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port to listen on (default: 5000); kept as text so it can come from the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    /// Route-layer request timeout in seconds (default: 60)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl ServerConfig {
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

/// Credential store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file holding credential records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl StoreConfig {
    pub fn path(&self) -> &str {
        self.path.as_deref().unwrap_or(DEFAULT_STORE_PATH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host(), "0.0.0.0");
        assert_eq!(config.request_timeout().as_secs(), 60);
    }

    #[test]
    fn test_server_config_serde() {
        let config = ServerConfig {
            host: None,
            port: Some("3000".to_string()),
            request_timeout_secs: Some(5),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"port\":\"3000\""));
        assert!(!json.contains("host"));

        let parsed: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_timeout().as_secs(), 5);
    }

    #[test]
    fn test_store_config_default_path() {
        assert_eq!(StoreConfig::default().path(), "querygate_credentials.db");
    }
}
