//! YAML configuration parser

use querygate_core::{
    CapabilityManifest, ConnectionParams, CredentialSeed, GatewayConfig, GatewayError, ParamValue,
    ServerConfig, StoreConfig,
};
use querygate_types::Category;
use serde::Deserialize;
use std::str::FromStr;

use crate::env::EnvSubstitutor;

/// YAML parser for Querygate configuration files
pub struct YamlParser;

/// On-disk schema. Scalars that may come from `{{ env.* }}` placeholders are
/// read loosely and normalized afterwards.
#[derive(Debug, Deserialize)]
struct RawConfig {
    name: String,

    #[serde(default)]
    server: Option<RawServer>,

    #[serde(default)]
    store: Option<StoreConfig>,

    #[serde(default)]
    seeds: Vec<RawSeed>,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    #[serde(default)]
    host: Option<String>,

    #[serde(default)]
    port: Option<serde_yaml::Value>,

    #[serde(default)]
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawSeed {
    category: String,

    #[serde(alias = "userid")]
    owner_id: String,

    #[serde(alias = "connection")]
    connection_id: String,

    #[serde(alias = "productType")]
    product: String,

    #[serde(default)]
    params: serde_yaml::Mapping,

    #[serde(default)]
    manifest: Option<CapabilityManifest>,
}

impl YamlParser {
    /// Parse a YAML string into a GatewayConfig, substituting `{{ env.* }}` first.
    pub fn parse(content: &str) -> Result<GatewayConfig, GatewayError> {
        let substituted = EnvSubstitutor::new().substitute(content)?;
        Self::parse_raw(&substituted)
    }

    /// Parse a YAML string without environment variable substitution
    pub fn parse_raw(content: &str) -> Result<GatewayConfig, GatewayError> {
        let raw = serde_yaml::from_str::<RawConfig>(content)
            .map_err(|e| GatewayError::Config(format!("YAML parse error: {}", e)))?;
        raw_to_config(raw)
    }
}

fn raw_to_config(raw: RawConfig) -> Result<GatewayConfig, GatewayError> {
    let server = raw
        .server
        .map(|s| ServerConfig {
            host: s.host,
            port: s.port.and_then(yaml_scalar_to_string),
            request_timeout_secs: s.request_timeout_secs,
        })
        .unwrap_or_default();

    let seeds = raw
        .seeds
        .into_iter()
        .enumerate()
        .map(|(i, seed)| raw_to_seed(i, seed))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GatewayConfig {
        name: raw.name,
        server,
        store: raw.store.unwrap_or_default(),
        seeds,
    })
}

fn raw_to_seed(index: usize, seed: RawSeed) -> Result<CredentialSeed, GatewayError> {
    let category = Category::from_str(&seed.category)
        .map_err(|e| GatewayError::Config(format!("seeds[{}]: {}", index, e)))?;

    let mut params = ConnectionParams::new();
    for (key, value) in seed.params {
        let key = yaml_scalar_to_string(key).ok_or_else(|| {
            GatewayError::Config(format!("seeds[{}]: parameter names must be scalars", index))
        })?;
        if let Some(value) = param_value(&key, value).map_err(|e| {
            GatewayError::Config(format!("seeds[{}]: {}", index, e))
        })? {
            params.insert(key, value);
        }
    }

    Ok(CredentialSeed {
        category,
        owner_id: seed.owner_id,
        connection_id: seed.connection_id,
        product: seed.product,
        params,
        manifest: seed.manifest,
    })
}

/// Integers stay integers, other scalars become text, nulls are dropped.
fn param_value(key: &str, value: serde_yaml::Value) -> Result<Option<ParamValue>, String> {
    match value {
        serde_yaml::Value::Null => Ok(None),
        serde_yaml::Value::Number(n) => Ok(Some(match n.as_i64() {
            Some(i) => ParamValue::Int(i),
            None => ParamValue::Text(n.to_string()),
        })),
        serde_yaml::Value::Bool(b) => Ok(Some(ParamValue::Text(b.to_string()))),
        serde_yaml::Value::String(s) => Ok(Some(ParamValue::Text(s))),
        _ => Err(format!("parameter '{}' must be a scalar", key)),
    }
}

fn yaml_scalar_to_string(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querygate_types::QueryKind;

    #[test]
    fn test_parse_minimal_config() {
        let config = YamlParser::parse_raw("name: minimal-gateway\n").unwrap();
        assert_eq!(config.name, "minimal-gateway");
        assert_eq!(config.port(), 5000);
        assert_eq!(config.store.path(), "querygate_credentials.db");
        assert!(config.seeds.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
name: querygate
server:
  host: 127.0.0.1
  port: 8080
  request_timeout_secs: 15
store:
  path: /var/lib/querygate/creds.db
seeds:
  - category: db
    owner_id: user_001
    connection_id: conn_001
    product: postgresql
    params:
      host: localhost
      port: 5432
      user: app
      password: secret
      database: shop
      sslmode: ~
  - category: ss
    userid: user_001
    connection: sheet_1
    productType: googlesheet
    params:
      sheet_id: abc123
    manifest:
      required_connection_params: [sheet_id]
      supported_query_kind: FORMULA
"#;
        let config = YamlParser::parse_raw(yaml).unwrap();
        assert_eq!(config.server.host(), "127.0.0.1");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.server.request_timeout().as_secs(), 15);
        assert_eq!(config.store.path(), "/var/lib/querygate/creds.db");
        assert_eq!(config.seeds.len(), 2);

        let pg = &config.seeds[0];
        assert_eq!(pg.params.get_int("port").unwrap(), Some(5432));
        assert!(!pg.params.contains("sslmode"));

        let sheet = &config.seeds[1];
        assert_eq!(sheet.category, Category::Ss);
        assert_eq!(sheet.connection_id, "sheet_1");
        assert_eq!(
            sheet.manifest.as_ref().unwrap().supported_query_kind,
            QueryKind::Formula
        );
    }

    #[test]
    fn test_port_from_environment() {
        std::env::set_var("QG_YAML_TEST_PORT", "7001");
        let config = YamlParser::parse("name: envy\nserver:\n  port: \"{{ env.QG_YAML_TEST_PORT }}\"\n").unwrap();
        assert_eq!(config.port(), 7001);
        std::env::remove_var("QG_YAML_TEST_PORT");
    }

    #[test]
    fn test_nested_param_rejected() {
        let yaml = r#"
name: bad
seeds:
  - category: db
    owner_id: u
    connection_id: c
    product: mysql
    params:
      host: { nested: true }
"#;
        let err = YamlParser::parse_raw(yaml).unwrap_err();
        assert!(err.to_string().contains("seeds[0]"));
    }

    #[test]
    fn test_unknown_category() {
        let yaml = "name: bad\nseeds:\n  - {category: crm, owner_id: u, connection_id: c, product: zoho}\n";
        assert!(matches!(
            YamlParser::parse_raw(yaml),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(YamlParser::parse_raw("invalid: yaml: content: [").is_err());
    }
}
