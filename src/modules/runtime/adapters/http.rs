//! Shared HTTP plumbing for REST-backed adapters

use once_cell::sync::Lazy;
use querygate_core::{scalar_text, GatewayError, LogicalQuery, Result};
use querygate_types::Product;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder};
use serde_json::{Map, Value};

static LINK_NEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="?next"?"#).expect("Invalid regex"));

/// Build the HTTP client used by every REST adapter.
///
/// Idle connections are not kept, so no backend session outlives the call
/// that opened it.
pub fn client() -> Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(0)
        .user_agent(concat!("querygate/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {}", e)))
}

/// Normalize a host or URL from a credential into a base URL without a trailing slash.
pub fn base_url(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches('/');
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    }
}

/// Send a request and decode a JSON body, turning non-2xx responses into adapter errors.
pub async fn send_json(product: Product, request: RequestBuilder) -> Result<(HeaderMap, Value)> {
    let (headers, body) = send_text(product, request).await?;
    if body.trim().is_empty() {
        return Ok((headers, Value::Null));
    }
    let value = serde_json::from_str(&body)
        .map_err(|e| GatewayError::adapter(product.as_str(), format!("malformed JSON response: {}", e)))?;
    Ok((headers, value))
}

/// Send a request and return the raw body.
pub async fn send_text(product: Product, request: RequestBuilder) -> Result<(HeaderMap, String)> {
    let response = request
        .send()
        .await
        .map_err(|e| GatewayError::adapter(product.as_str(), e))?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::adapter(product.as_str(), e))?;
    if !status.is_success() {
        return Err(GatewayError::adapter(
            product.as_str(),
            format!("HTTP {}: {}", status.as_u16(), body.trim()),
        ));
    }
    Ok((headers, body))
}

/// Target of a `Link: <...>; rel="next"` header, if any.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(reqwest::header::LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .find_map(|part| LINK_NEXT.captures(part).map(|c| c[1].to_string()))
}

/// Flatten a parameter mapping into query-string pairs; arrays repeat the key.
pub fn flatten_params(params: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    pairs.push((key.clone(), scalar_or_json(item)));
                }
            }
            other => pairs.push((key.clone(), scalar_or_json(other))),
        }
    }
    pairs
}

fn scalar_or_json(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => value.to_string(),
        other => scalar_text(other),
    }
}

/// Resource path from the table/collection hint or the reserved `endpoint` key.
///
/// The `endpoint` key is removed from `params` so it is never forwarded.
pub fn take_endpoint(
    product: Product,
    query: &LogicalQuery,
    params: &mut Map<String, Value>,
) -> Result<String> {
    let from_params = params
        .remove("endpoint")
        .and_then(|v| v.as_str().map(str::to_string));
    query
        .table_hint()
        .map(str::to_string)
        .or(from_params)
        .map(|p| p.trim().trim_matches('/').to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            GatewayError::Validation(format!(
                "{} requires an endpoint (table hint or \"endpoint\" key)",
                product
            ))
        })
}

/// Items of a REST payload: the array itself, the first array-valued field of
/// an object, or the object as a single record.
pub fn extract_records(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        Value::Object(mut map) => {
            let key = map
                .iter()
                .find(|(_, v)| v.is_array())
                .map(|(k, _)| k.clone());
            match key.and_then(|k| map.remove(&k)) {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(map)],
            }
        }
        other => vec![other],
    }
}
