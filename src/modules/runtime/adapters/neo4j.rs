//! Neo4j adapter over the HTTP Query API v2
//!
//! Results are requested in the typed JSON format so temporal values, nodes
//! and relationships keep their type tags through to normalization.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use querygate_core::{
    ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, RawQuery, Result,
};
use querygate_types::{Product, QueryKind};
use reqwest::{Client, Url};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::http::send_json;
use super::Adapter;

const TYPED_JSON: &str = "application/vnd.neo4j.query";
const HTTP_PORT: u16 = 7474;

pub struct Neo4jAdapter {
    client: Client,
}

impl Neo4jAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// HTTP endpoint for a driver-style URI.
///
/// `neo4j+s://` and `bolt+s://` map to HTTPS on the default port, plain
/// `neo4j://` and `bolt://` to HTTP on 7474, and HTTP(S) URIs pass through.
fn http_base(uri: &str) -> Result<String> {
    let invalid = |e: String| GatewayError::Validation(format!("invalid neo4j uri '{}': {}", uri, e));
    let url = Url::parse(uri.trim()).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| invalid("missing host".to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(uri.trim().trim_end_matches('/').to_string()),
        "neo4j+s" | "neo4j+ssc" | "bolt+s" | "bolt+ssc" => Ok(format!("https://{}", host)),
        "neo4j" | "bolt" => Ok(format!("http://{}:{}", host, HTTP_PORT)),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

fn properties(value: Option<&Value>) -> Vec<(String, NativeValue)> {
    value
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(k, v)| (k.clone(), typed_value(v)))
                .collect()
        })
        .unwrap_or_default()
}

fn text_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Convert one `{"$type": ..., "_value": ...}` value.
fn typed_value(value: &Value) -> NativeValue {
    let (Some(kind), Some(inner)) = (value.get("$type").and_then(Value::as_str), value.get("_value")) else {
        return match value {
            Value::Null => NativeValue::Null,
            other => NativeValue::Json(other.clone()),
        };
    };
    let text = inner.as_str();
    match kind {
        "Null" => NativeValue::Null,
        "Boolean" => inner.as_bool().map(NativeValue::Bool).unwrap_or(NativeValue::Null),
        "Integer" => text
            .and_then(|t| t.parse().ok())
            .or_else(|| inner.as_i64())
            .map(NativeValue::Int)
            .unwrap_or_else(|| NativeValue::Other(inner.to_string())),
        "Float" => text
            .and_then(|t| t.parse().ok())
            .or_else(|| inner.as_f64())
            .map(NativeValue::Float)
            .unwrap_or_else(|| NativeValue::Other(inner.to_string())),
        "String" => NativeValue::Text(text.unwrap_or_default().to_string()),
        "Base64" => text
            .and_then(|t| BASE64.decode(t).ok())
            .map(NativeValue::Bytes)
            .unwrap_or_else(|| NativeValue::Other(inner.to_string())),
        // Temporal and spatial values already arrive as ISO-8601 / WKT text
        "Date" | "Time" | "LocalTime" | "DateTime" | "OffsetDateTime" | "ZonedDateTime"
        | "LocalDateTime" | "Duration" | "Point" => {
            NativeValue::Text(text.map(str::to_string).unwrap_or_else(|| inner.to_string()))
        }
        "List" | "Path" => NativeValue::List(
            inner
                .as_array()
                .map(|items| items.iter().map(typed_value).collect())
                .unwrap_or_default(),
        ),
        "Map" => NativeValue::Map(properties(Some(inner))),
        "Node" => NativeValue::Node {
            element_id: text_field(inner, "_element_id"),
            labels: inner
                .get("_labels")
                .and_then(Value::as_array)
                .map(|labels| {
                    labels
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            properties: properties(inner.get("_properties")),
        },
        "Relationship" => NativeValue::Relationship {
            element_id: text_field(inner, "_element_id"),
            rel_type: text_field(inner, "_type"),
            start_element_id: text_field(inner, "_start_node_element_id"),
            end_element_id: text_field(inner, "_end_node_element_id"),
            properties: properties(inner.get("_properties")),
        },
        _ => NativeValue::Other(inner.to_string()),
    }
}

#[async_trait]
impl Adapter for Neo4jAdapter {
    fn product(&self) -> Product {
        Product::Neo4j
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let cypher = query.query_text(QueryKind::GraphCypher)?;
        let base = http_base(&params.require("uri")?)?;
        let database = match &query.hints.database {
            Some(db) => db.clone(),
            None => params.require("database")?,
        };
        debug!(database = %database, "Running Cypher query");

        let mut body = Map::new();
        body.insert("statement".into(), Value::String(cypher));
        body.insert("accessMode".into(), Value::String("Read".into()));
        if let RawQuery::Mapping(map) = &query.raw_query {
            if let Some(parameters) = map.get("parameters").filter(|p| p.is_object()) {
                body.insert("parameters".into(), parameters.clone());
            }
        }

        let request = self
            .client
            .post(format!("{}/db/{}/query/v2", base, database))
            .basic_auth(params.require("username")?, Some(params.require("password")?))
            .header("Accept", TYPED_JSON)
            .json(&Value::Object(body));
        let (_, reply) = send_json(Product::Neo4j, request).await?;

        if let Some(error) = reply
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
        {
            let message = error.get("message").and_then(Value::as_str).unwrap_or("query failed");
            return Err(GatewayError::adapter(Product::Neo4j.as_str(), message));
        }

        let columns = reply
            .pointer("/data/fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .map(|f| f.as_str().unwrap_or_default().to_string())
                    .collect()
            })
            .unwrap_or_default();
        let rows = reply
            .pointer("/data/values")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(typed_value).collect())
                            .unwrap_or_else(|| vec![typed_value(row)])
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(NativeResult::Tabular { columns, rows })
    }
}
