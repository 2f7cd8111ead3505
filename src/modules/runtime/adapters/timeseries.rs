//! Prometheus, Loki and Tempo adapters
//!
//! All three speak plain HTTP GET with basic auth (`username` / `api_token`),
//! which is how Grafana Cloud exposes them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, RawQuery, Result};
use querygate_types::{Product, QueryKind};
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

use super::http::{base_url, extract_records, flatten_params, send_json};
use super::Adapter;

const LOKI_DEFAULT_LIMIT: u64 = 100;
const LOKI_DEFAULT_MINUTES: i64 = 60;

async fn get_json(
    client: &Client,
    product: Product,
    params: &ConnectionParams,
    path: &str,
    query: &[(String, String)],
) -> Result<Value> {
    let url = format!("{}{}", base_url(&params.require("base_url")?), path);
    let request = client
        .get(url)
        .basic_auth(params.require("username")?, Some(params.require("api_token")?))
        .query(query);
    let (_, body) = send_json(product, request).await?;
    if body.get("status").and_then(Value::as_str) == Some("error") {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("query failed");
        return Err(GatewayError::adapter(product.as_str(), message));
    }
    Ok(body)
}

fn labels(value: Option<&Value>) -> NativeValue {
    value.cloned().map(NativeValue::Json).unwrap_or(NativeValue::Null)
}

/// A `[unix_seconds, "value"]` sample as `(timestamp, value)`.
fn sample(pair: &Value) -> (NativeValue, NativeValue) {
    let timestamp = pair
        .get(0)
        .and_then(Value::as_f64)
        .and_then(|secs| {
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
            DateTime::<Utc>::from_timestamp(whole, nanos)
        })
        .map(|dt| NativeValue::DateTime(dt.into()))
        .unwrap_or(NativeValue::Null);
    let value = match pair.get(1) {
        Some(Value::String(raw)) => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(NativeValue::Float)
            .unwrap_or_else(|| NativeValue::Text(raw.clone())),
        Some(other) => NativeValue::Json(other.clone()),
        None => NativeValue::Null,
    };
    (timestamp, value)
}

fn sample_record(metric: NativeValue, pair: &Value) -> NativeValue {
    let (timestamp, value) = sample(pair);
    NativeValue::Map(vec![
        ("metric".to_string(), metric),
        ("timestamp".to_string(), timestamp),
        ("value".to_string(), value),
    ])
}

/// Records for a Prometheus-style `data` block (vector, matrix, scalar, string).
fn metric_records(data: &Value) -> Vec<NativeValue> {
    let result = data.get("result");
    match data.get("resultType").and_then(Value::as_str) {
        Some("vector") => result
            .and_then(Value::as_array)
            .map(|series| {
                series
                    .iter()
                    .map(|s| sample_record(labels(s.get("metric")), s.get("value").unwrap_or(&Value::Null)))
                    .collect()
            })
            .unwrap_or_default(),
        Some("matrix") => result
            .and_then(Value::as_array)
            .map(|series| {
                series
                    .iter()
                    .flat_map(|s| {
                        let metric = labels(s.get("metric"));
                        s.get("values")
                            .and_then(Value::as_array)
                            .into_iter()
                            .flatten()
                            .map(move |pair| sample_record(metric.clone(), pair))
                    })
                    .collect()
            })
            .unwrap_or_default(),
        Some("scalar") | Some("string") => result
            .map(|pair| vec![sample_record(NativeValue::Null, pair)])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Prometheus instant queries (`/api/v1/query`).
pub struct PrometheusAdapter {
    client: Client,
}

impl PrometheusAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter for PrometheusAdapter {
    fn product(&self) -> Product {
        Product::Prometheus
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let promql = query.query_text(QueryKind::Command)?;
        let mut pairs = vec![("query".to_string(), promql)];
        if let RawQuery::Mapping(map) = &query.raw_query {
            if let Some(time) = map.get("time") {
                pairs.push(("time".to_string(), querygate_core::scalar_text(time)));
            }
        }
        debug!(product = "prometheus", "Running instant query");

        let body = get_json(&self.client, Product::Prometheus, params, "/api/v1/query", &pairs).await?;
        let mut records = metric_records(body.get("data").unwrap_or(&Value::Null));
        if let Some(limit) = query.hints.limit {
            records.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(NativeResult::Documents(records))
    }
}

/// Loki log range queries over a trailing window.
pub struct LokiAdapter {
    client: Client,
}

impl LokiAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Window length in minutes: the `minutes` key of a mapping query, else one hour.
    fn window_minutes(query: &LogicalQuery) -> Result<i64> {
        let RawQuery::Mapping(map) = &query.raw_query else {
            return Ok(LOKI_DEFAULT_MINUTES);
        };
        match map.get("minutes") {
            None | Some(Value::Null) => Ok(LOKI_DEFAULT_MINUTES),
            Some(value) => value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
                .filter(|m| *m > 0)
                .ok_or_else(|| GatewayError::Validation("minutes must be a positive integer".to_string())),
        }
    }

    fn stream_records(data: &Value) -> Vec<NativeValue> {
        let Some(streams) = data.get("result").and_then(Value::as_array) else {
            return Vec::new();
        };
        streams
            .iter()
            .flat_map(|stream| {
                let stream_labels = labels(stream.get("stream"));
                stream
                    .get("values")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .map(move |entry| {
                        let timestamp = entry
                            .get(0)
                            .and_then(Value::as_str)
                            .and_then(|ns| ns.parse::<i64>().ok())
                            .map(|ns| NativeValue::DateTime(DateTime::<Utc>::from_timestamp_nanos(ns).into()))
                            .unwrap_or(NativeValue::Null);
                        let line = entry
                            .get(1)
                            .and_then(Value::as_str)
                            .map(|l| NativeValue::Text(l.to_string()))
                            .unwrap_or(NativeValue::Null);
                        NativeValue::Map(vec![
                            ("timestamp".to_string(), timestamp),
                            ("line".to_string(), line),
                            ("labels".to_string(), stream_labels.clone()),
                        ])
                    })
            })
            .collect()
    }
}

#[async_trait]
impl Adapter for LokiAdapter {
    fn product(&self) -> Product {
        Product::Loki
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let logql = query.query_text(QueryKind::Command)?;
        let minutes = Self::window_minutes(query)?;
        let end = Utc::now()
            .timestamp_nanos_opt()
            .ok_or_else(|| GatewayError::Internal("clock out of range".to_string()))?;
        let start = end - minutes * 60 * 1_000_000_000;
        let limit = query.hints.limit.unwrap_or(LOKI_DEFAULT_LIMIT);
        debug!(product = "loki", minutes, limit, "Running range query");

        let pairs = vec![
            ("query".to_string(), logql),
            ("limit".to_string(), limit.to_string()),
            ("start".to_string(), start.to_string()),
            ("end".to_string(), end.to_string()),
            ("direction".to_string(), "backward".to_string()),
        ];
        let body = get_json(&self.client, Product::Loki, params, "/loki/api/v1/query_range", &pairs).await?;
        let data = body.get("data").unwrap_or(&Value::Null);
        let records = match data.get("resultType").and_then(Value::as_str) {
            Some("streams") => Self::stream_records(data),
            _ => metric_records(data),
        };
        Ok(NativeResult::Documents(records))
    }
}

/// Tempo trace search (`/api/search`) or trace lookup (`/api/traces/{id}`).
pub struct TempoAdapter {
    client: Client,
}

impl TempoAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Adapter for TempoAdapter {
    fn product(&self) -> Product {
        Product::Tempo
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let mut search: Map<String, Value> = query.params()?;
        let endpoint = match search.remove("endpoint") {
            Some(Value::String(endpoint)) => endpoint.trim().trim_matches('/').to_string(),
            _ => query
                .table_hint()
                .map(|t| t.trim_matches('/').to_string())
                .unwrap_or_else(|| "search".to_string()),
        };
        if let Some(limit) = query.hints.limit {
            search.entry("limit").or_insert(Value::from(limit));
        }
        debug!(product = "tempo", endpoint = %endpoint, "Searching traces");

        let path = format!("/api/{}", endpoint);
        let mut body = get_json(&self.client, Product::Tempo, params, &path, &flatten_params(&search)).await?;
        let records = match body.get_mut("traces").map(Value::take) {
            Some(Value::Array(traces)) => traces,
            _ => extract_records(body),
        };
        Ok(NativeResult::Documents(records.into_iter().map(NativeValue::Json).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(base: String) -> ConnectionParams {
        ConnectionParams::new()
            .with("base_url", base)
            .with("username", "12345")
            .with("api_token", "glc")
    }

    #[test]
    fn test_matrix_expands_samples() {
        let data = json!({
            "resultType": "matrix",
            "result": [
                {"metric": {"job": "api"}, "values": [[1704067200, "1"], [1704067260, "2.5"]]},
                {"metric": {"job": "db"}, "values": [[1704067200, "NaN"]]}
            ]
        });
        let records = metric_records(&data);
        assert_eq!(records.len(), 3);
        let NativeValue::Map(last) = &records[2] else {
            panic!("expected a map")
        };
        assert_eq!(last[2], ("value".to_string(), NativeValue::Text("NaN".into())));
    }

    #[test]
    fn test_loki_window() {
        assert_eq!(LokiAdapter::window_minutes(&LogicalQuery::new("loki", "{app=\"x\"}")).unwrap(), 60);
        let mut map = Map::new();
        map.insert("query".into(), json!("{app=\"x\"}"));
        map.insert("minutes".into(), json!(15));
        let query = LogicalQuery::new("loki", RawQuery::Mapping(map));
        assert_eq!(LokiAdapter::window_minutes(&query).unwrap(), 15);
    }

    #[tokio::test]
    async fn test_prometheus_vector() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .and(query_param("query", "up"))
            .and(header("authorization", "Basic MTIzNDU6Z2xj"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [{"metric": {"__name__": "up", "job": "api"}, "value": [1704067200.5, "1"]}]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = PrometheusAdapter::new(http::client().unwrap());
        let records = adapter
            .execute(&credentials(server.uri()), &LogicalQuery::new("prometheus", "up"))
            .await
            .unwrap();
        assert_eq!(
            records[0].clone().into_value(),
            json!({
                "metric": {"__name__": "up", "job": "api"},
                "timestamp": "2024-01-01T00:00:00.500+00:00",
                "value": 1.0
            })
        );
    }

    #[tokio::test]
    async fn test_prometheus_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "errorType": "bad_data",
                "error": "parse error at char 4"
            })))
            .mount(&server)
            .await;

        let adapter = PrometheusAdapter::new(http::client().unwrap());
        let err = adapter
            .execute(&credentials(server.uri()), &LogicalQuery::new("prometheus", "up{"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("parse error"));
    }

    #[tokio::test]
    async fn test_loki_streams() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loki/api/v1/query_range"))
            .and(query_param("direction", "backward"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "data": {
                    "resultType": "streams",
                    "result": [{
                        "stream": {"app": "api"},
                        "values": [["1704067200000000000", "error: boom"], ["1704067199000000000", "error: bust"]]
                    }]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = LokiAdapter::new(http::client().unwrap());
        let records = adapter
            .execute(
                &credentials(server.uri()),
                &LogicalQuery::new("loki", r#"{app="api"} |= "error""#),
            )
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].clone().into_value(),
            json!({"timestamp": "2024-01-01T00:00:00+00:00", "line": "error: boom", "labels": {"app": "api"}})
        );
    }

    #[tokio::test]
    async fn test_tempo_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("tags", "service.name=checkout"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "traces": [{"traceID": "abc", "rootServiceName": "checkout", "durationMs": 12}],
                "metrics": {"inspectedTraces": 40}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = TempoAdapter::new(http::client().unwrap());
        let query = LogicalQuery::new("tempo", r#"{"tags": "service.name=checkout", "limit": 20}"#);
        let records = adapter.execute(&credentials(server.uri()), &query).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("traceID"), Some(&json!("abc")));
    }
}
