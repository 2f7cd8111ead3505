//! Credential records and connection parameters

use querygate_types::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::CapabilityManifest;
use crate::error::{GatewayError, Result};

/// A single connection parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Text(String),
}

impl ParamValue {
    pub fn is_blank(&self) -> bool {
        match self {
            ParamValue::Int(_) => false,
            ParamValue::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Int(n)
    }
}

/// Connection parameters for one backend, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionParams(BTreeMap<String, ParamValue>);

impl ConnectionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.get(key).map(|v| !v.is_blank()).unwrap_or(false)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Value as text, `None` when absent or blank.
    pub fn get(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .filter(|v| !v.is_blank())
            .map(|v| v.to_string())
    }

    /// Value as text, failing with a validation error naming the key.
    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| GatewayError::Validation(format!("missing connection parameter '{}'", key)))
    }

    /// Integer value; accepts both numeric and numeric-string forms.
    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(ParamValue::Int(n)) => Ok(Some(*n)),
            Some(ParamValue::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(ParamValue::Text(s)) => s.trim().parse().map(Some).map_err(|_| {
                GatewayError::Validation(format!("connection parameter '{}' must be an integer", key))
            }),
        }
    }

    pub fn port(&self, default: u16) -> Result<u16> {
        match self.get_int("port")? {
            None => Ok(default),
            Some(p) => u16::try_from(p)
                .map_err(|_| GatewayError::Validation(format!("port {} is out of range", p))),
        }
    }
}

impl FromIterator<(String, ParamValue)> for ConnectionParams {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Identity of a stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
    pub category: Category,
    pub owner_id: String,
    pub connection_id: String,
    pub product_name: String,
}

impl CredentialKey {
    pub fn new(
        category: Category,
        owner_id: impl Into<String>,
        connection_id: impl Into<String>,
        product_name: impl AsRef<str>,
    ) -> Self {
        Self {
            category,
            owner_id: owner_id.into(),
            connection_id: connection_id.into(),
            product_name: product_name.as_ref().trim().to_lowercase(),
        }
    }
}

impl fmt::Display for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.category, self.owner_id, self.connection_id, self.product_name
        )
    }
}

/// Stored connection parameters plus capability manifest for one
/// (category, owner, connection, product) key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(flatten)]
    pub key: CredentialKey,
    pub connection_params: ConnectionParams,
    pub manifest: CapabilityManifest,
}

impl CredentialRecord {
    pub fn product_name(&self) -> &str {
        &self.key.product_name
    }
}

/// Partial filter over credential keys. `None` fields match anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialFilter {
    pub category: Category,
    pub owner_id: Option<String>,
    pub connection_id: Option<String>,
    pub product_name: Option<String>,
}

impl CredentialFilter {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            owner_id: None,
            connection_id: None,
            product_name: None,
        }
    }

    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }

    pub fn product(mut self, product_name: impl AsRef<str>) -> Self {
        self.product_name = Some(product_name.as_ref().trim().to_lowercase());
        self
    }

    pub fn matches(&self, key: &CredentialKey) -> bool {
        key.category == self.category
            && self.owner_id.as_ref().map_or(true, |o| *o == key.owner_id)
            && self.connection_id.as_ref().map_or(true, |c| *c == key.connection_id)
            && self.product_name.as_ref().map_or(true, |p| *p == key.product_name)
    }
}
