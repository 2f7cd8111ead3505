//! Elasticsearch and OpenSearch adapter (`_search` with a query DSL body)

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use tracing::debug;

use super::http::{base_url, send_json};
use super::Adapter;

pub struct SearchAdapter {
    client: Client,
    product: Product,
}

impl SearchAdapter {
    pub fn elasticsearch(client: Client) -> Self {
        Self {
            client,
            product: Product::Elasticsearch,
        }
    }

    pub fn opensearch(client: Client) -> Self {
        Self {
            client,
            product: Product::Opensearch,
        }
    }

    /// Cluster endpoint: an explicit `host`, or the Elasticsearch `cloud_id`.
    fn endpoint(&self, params: &ConnectionParams) -> Result<String> {
        if let Some(host) = params.get("host") {
            return Ok(base_url(&host));
        }
        match self.product {
            Product::Elasticsearch => cloud_endpoint(&params.require("cloud_id")?),
            _ => params.require("host").map(|h| base_url(&h)),
        }
    }
}

/// Decode an Elastic Cloud id (`name:base64(host$es_id$kibana_id)`) into
/// the HTTPS endpoint of its Elasticsearch cluster.
fn cloud_endpoint(cloud_id: &str) -> Result<String> {
    let invalid = || GatewayError::Validation("invalid cloud_id".to_string());
    let encoded = cloud_id
        .trim()
        .rsplit_once(':')
        .map(|(_, data)| data)
        .unwrap_or(cloud_id.trim());
    let decoded = BASE64.decode(encoded).map_err(|_| invalid())?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid())?;
    let mut parts = decoded.trim_end_matches('\n').split('$');
    let host = parts.next().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
    let es_id = parts.next().filter(|id| !id.is_empty()).ok_or_else(invalid)?;
    let (host, port) = match host.rsplit_once(':') {
        Some((h, p)) if p.parse::<u16>().is_ok() => (h, Some(p)),
        _ => (host, None),
    };
    Ok(match port {
        Some(port) if port != "443" => format!("https://{}.{}:{}", es_id, host, port),
        _ => format!("https://{}.{}", es_id, host),
    })
}

/// Characters Elasticsearch forbids in index names, plus `%` and `:`.
const INDEX_FORBIDDEN_CHARS: &[char] = &['\\', '/', '?', '"', '<', '>', '|', ' ', '#', '%', ':'];
const INDEX_FORBIDDEN_WORDS: &[&str] = &["delete", "update", "reindex"];

/// Check a search target (one index, a comma list, or a wildcard pattern)
/// against the index naming rules.
fn validate_index(target: &str) -> Result<String> {
    let target = target.trim();
    let invalid = |reason: &str| GatewayError::Validation(format!("invalid index '{}': {}", target, reason));
    if target.is_empty() {
        return Err(invalid("empty"));
    }
    for name in target.split(',') {
        if name.is_empty() || name == "." || name == ".." {
            return Err(invalid("empty or relative name"));
        }
        if name.starts_with(['_', '-', '+']) {
            return Err(invalid("must not start with '_', '-' or '+'"));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control() || INDEX_FORBIDDEN_CHARS.contains(&c)) {
            return Err(invalid("contains a forbidden character"));
        }
        let lower = name.to_lowercase();
        if let Some(word) = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .find(|w| INDEX_FORBIDDEN_WORDS.contains(w))
        {
            return Err(invalid(&format!("forbidden word '{}'", word)));
        }
    }
    Ok(target.to_string())
}

/// `{endpoint}/{index}/_search` with the index pushed as one encoded segment.
fn search_url(endpoint: &str, index: &str) -> Result<Url> {
    let invalid = || GatewayError::Validation(format!("invalid search endpoint '{}'", endpoint));
    let mut url = Url::parse(endpoint).map_err(|_| invalid())?;
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .push(index)
        .push("_search");
    Ok(url)
}

/// Query DSL with the row cap applied to `size`.
fn search_body(query: &LogicalQuery) -> Result<Map<String, Value>> {
    let mut body = query.params()?;
    if let Some(limit) = query.hints.limit {
        let current = body.get("size").and_then(Value::as_u64);
        if current.map(|size| size > limit).unwrap_or(true) {
            body.insert("size".into(), Value::from(limit));
        }
    }
    Ok(body)
}

/// One record per hit: `_id`, `_index`, `_score`, then the `_source` fields.
fn hit_record(hit: Value) -> NativeValue {
    let Value::Object(mut hit) = hit else {
        return NativeValue::Json(hit);
    };
    let mut record = Map::new();
    for key in ["_id", "_index", "_score"] {
        record.insert(key.to_string(), hit.remove(key).unwrap_or(Value::Null));
    }
    if let Some(Value::Object(source)) = hit.remove("_source") {
        record.extend(source);
    }
    if let Some(fields) = hit.remove("fields") {
        record.entry("fields").or_insert(fields);
    }
    NativeValue::Json(Value::Object(record))
}

#[async_trait]
impl Adapter for SearchAdapter {
    fn product(&self) -> Product {
        self.product
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let index = match query.hints.index.as_deref().or(query.table_hint()) {
            Some(index) => index.to_string(),
            None => params.get("default_index").ok_or_else(|| {
                GatewayError::Validation(format!(
                    "{} requires an index (index hint or default_index)",
                    self.product
                ))
            })?,
        };
        let index = validate_index(&index)?;
        let body = search_body(query)?;
        let endpoint = self.endpoint(params)?;
        debug!(product = %self.product, index = %index, "Running search");

        let request = self
            .client
            .post(search_url(&endpoint, &index)?)
            .basic_auth(params.require("username")?, Some(params.require("password")?))
            .json(&Value::Object(body));
        let (_, mut reply) = send_json(self.product, request).await?;

        let hits = match reply.pointer_mut("/hits/hits").map(Value::take) {
            Some(Value::Array(hits)) => hits,
            _ => Vec::new(),
        };
        Ok(NativeResult::Documents(hits.into_iter().map(hit_record).collect()))
    }
}
