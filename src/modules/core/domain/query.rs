//! Logical query definitions

use querygate_types::QueryKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};

/// Caller-supplied query payload before any adapter translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawQuery {
    Text(String),
    Mapping(Map<String, Value>),
}

impl RawQuery {
    /// Accepts a JSON string or object; anything else is a validation error.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(text) => Ok(RawQuery::Text(text)),
            Value::Object(map) => Ok(RawQuery::Mapping(map)),
            Value::Null => Err(GatewayError::Validation(
                "query parameter is required".to_string(),
            )),
            other => Err(GatewayError::Validation(format!(
                "query must be a string or an object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawQuery::Text(text) => text.trim().is_empty(),
            RawQuery::Mapping(map) => map.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawQuery::Text(text) => Some(text),
            RawQuery::Mapping(_) => None,
        }
    }
}

impl From<&str> for RawQuery {
    fn from(text: &str) -> Self {
        RawQuery::Text(text.to_string())
    }
}

impl From<String> for RawQuery {
    fn from(text: String) -> Self {
        RawQuery::Text(text)
    }
}

/// Optional routing hints supplied next to the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

/// A transient, per-request query against one product.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalQuery {
    pub product_name: String,
    pub raw_query: RawQuery,
    pub hints: QueryHints,
}

impl LogicalQuery {
    pub fn new(product_name: impl Into<String>, raw_query: impl Into<RawQuery>) -> Self {
        Self {
            product_name: product_name.into(),
            raw_query: raw_query.into(),
            hints: QueryHints::default(),
        }
    }

    pub fn with_hints(mut self, hints: QueryHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.hints.table = Some(table.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.hints.limit = Some(limit);
        self
    }

    /// Table hint, falling back to the collection hint.
    pub fn table_hint(&self) -> Option<&str> {
        self.hints
            .table
            .as_deref()
            .or(self.hints.collection.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Textual form of the query as seen by the safety gate.
    pub fn query_text(&self, kind: QueryKind) -> Result<String> {
        let map = match &self.raw_query {
            RawQuery::Text(text) => return Ok(text.clone()),
            RawQuery::Mapping(map) => map,
        };

        match kind {
            QueryKind::DocumentFilter | QueryKind::RestParams => Ok(serde_json::to_string(map)?),
            QueryKind::Command if map.contains_key("command") => {
                let command = map.get("command").and_then(Value::as_str).unwrap_or_default();
                let args = match map.get("args") {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(scalar_text)
                        .collect::<Vec<_>>()
                        .join(", "),
                    Some(other) => scalar_text(other),
                    None => String::new(),
                };
                Ok(format!("{} {}", command, args).trim().to_string())
            }
            _ => map
                .get("query")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    GatewayError::Validation(format!("{} queries must be text", kind))
                }),
        }
    }

    /// The query as a parameter mapping (JSON object or JSON-encoded object text).
    pub fn params(&self) -> Result<Map<String, Value>> {
        match &self.raw_query {
            RawQuery::Mapping(map) => Ok(map.clone()),
            RawQuery::Text(text) if text.trim().is_empty() => Ok(Map::new()),
            RawQuery::Text(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Ok(map),
                _ => Err(GatewayError::Validation(
                    "query must be a JSON object".to_string(),
                )),
            },
        }
    }
}

/// Text of a scalar without JSON quoting.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_query_from_value() {
        assert_eq!(
            RawQuery::from_value(json!("SELECT 1")).unwrap(),
            RawQuery::Text("SELECT 1".into())
        );
        assert!(matches!(
            RawQuery::from_value(json!({"a": 1})).unwrap(),
            RawQuery::Mapping(_)
        ));
        assert!(RawQuery::from_value(json!([1, 2])).is_err());

        let err = RawQuery::from_value(Value::Null).unwrap_err();
        assert_eq!(err.sanitized_message(), "query parameter is required");
    }

    #[test]
    fn test_table_hint_falls_back_to_collection() {
        let mut query = LogicalQuery::new("mongodb", "{}");
        assert!(query.table_hint().is_none());

        query.hints.collection = Some("orders".into());
        assert_eq!(query.table_hint(), Some("orders"));

        query.hints.table = Some("customers".into());
        assert_eq!(query.table_hint(), Some("customers"));
    }

    #[test]
    fn test_command_mapping_to_text() {
        let map = json!({"command": "LRANGE", "args": ["logs", 0, 10]});
        let query = LogicalQuery::new("redis", RawQuery::from_value(map).unwrap());
        assert_eq!(query.query_text(QueryKind::Command).unwrap(), "LRANGE logs, 0, 10");

        let map = json!({"command": "get", "args": "session:1"});
        let query = LogicalQuery::new("redis", RawQuery::from_value(map).unwrap());
        assert_eq!(query.query_text(QueryKind::Command).unwrap(), "get session:1");
    }

    #[test]
    fn test_sql_mapping_requires_query_key() {
        let query = LogicalQuery::new(
            "mysql",
            RawQuery::from_value(json!({"query": "SELECT 1 FROM t"})).unwrap(),
        );
        assert_eq!(query.query_text(QueryKind::Sql).unwrap(), "SELECT 1 FROM t");

        let query = LogicalQuery::new("mysql", RawQuery::from_value(json!({"x": 1})).unwrap());
        assert!(query.query_text(QueryKind::Sql).is_err());
    }

    #[test]
    fn test_params_decodes_json_text() {
        let query = LogicalQuery::new("hubspot", r#"{"endpoint": "contacts"}"#);
        assert_eq!(query.params().unwrap()["endpoint"], "contacts");

        let query = LogicalQuery::new("hubspot", "");
        assert!(query.params().unwrap().is_empty());

        let query = LogicalQuery::new("hubspot", "not json");
        assert!(query.params().is_err());
    }
}
