//! Odoo adapter (JSON-RPC `execute_kw`, read-only methods)

use async_trait::async_trait;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use super::pagination::{drain, Page, PageMarker, PageSource};
use crate::adapters::http::{base_url, send_json};
use crate::adapters::Adapter;

/// Model methods that never write.
pub const READ_METHODS: &[&str] = &[
    "search_read",
    "read",
    "search",
    "search_count",
    "fields_get",
    "name_search",
    "read_group",
];

const DEFAULT_PAGE_SIZE: u64 = 500;

pub struct OdooAdapter {
    client: Client,
}

impl OdooAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Parsed `{"model", "method", "domain", ...kwargs}` mapping.
#[derive(Debug)]
struct OdooCall {
    model: String,
    method: String,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl OdooCall {
    fn from_query(query: &LogicalQuery) -> Result<Self> {
        let mut params = query.params()?;
        let model = params
            .remove("model")
            .and_then(|v| v.as_str().map(str::to_string))
            .or_else(|| query.table_hint().map(str::to_string))
            .ok_or_else(|| GatewayError::Validation("odoo requires a \"model\"".to_string()))?;
        let method = params
            .remove("method")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "search_read".to_string());
        if !READ_METHODS.contains(&method.as_str()) {
            return Err(GatewayError::Validation(format!(
                "odoo method '{}' is not allowed; allowed: {}",
                method,
                READ_METHODS.join(", ")
            )));
        }

        let args = match params.remove("args") {
            Some(Value::Array(args)) => args,
            Some(_) => {
                return Err(GatewayError::Validation("odoo \"args\" must be an array".to_string()))
            }
            None => match method.as_str() {
                "search_read" | "search" | "search_count" | "read_group" => {
                    vec![params.remove("domain").unwrap_or_else(|| json!([]))]
                }
                "read" => vec![params.remove("ids").unwrap_or_else(|| json!([]))],
                _ => Vec::new(),
            },
        };
        params.remove("domain");

        Ok(Self {
            model,
            method,
            args,
            kwargs: params,
        })
    }
}

struct OdooSession<'a> {
    client: &'a Client,
    endpoint: String,
    db: String,
    uid: Value,
    key: String,
    call: OdooCall,
    page_size: u64,
    max_records: Option<u64>,
    request_id: AtomicU64,
}

impl OdooSession<'_> {
    async fn execute_kw(&self, kwargs: &Map<String, Value>) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "params": {
                "service": "object",
                "method": "execute_kw",
                "args": [
                    self.db,
                    self.uid,
                    self.key,
                    self.call.model,
                    self.call.method,
                    self.call.args,
                    kwargs,
                ],
            },
        });
        let (_, mut reply) =
            send_json(Product::Odoo, self.client.post(&self.endpoint).json(&body)).await?;

        if let Some(error) = reply.get("error") {
            let message = error
                .pointer("/data/message")
                .or_else(|| error.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown JSON-RPC error");
            return Err(GatewayError::adapter(Product::Odoo.as_str(), message));
        }
        Ok(reply.get_mut("result").map(Value::take).unwrap_or(Value::Null))
    }
}

#[async_trait]
impl PageSource for OdooSession<'_> {
    fn product(&self) -> Product {
        Product::Odoo
    }

    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page> {
        let offset = match marker {
            Some(PageMarker::Offset(n)) => *n,
            _ => 0,
        };
        let page_size = match self.max_records {
            Some(max) => self.page_size.min(max.saturating_sub(offset)),
            None => self.page_size,
        };
        let mut kwargs = self.call.kwargs.clone();
        kwargs.insert("offset".into(), Value::from(offset));
        kwargs.insert("limit".into(), Value::from(page_size));

        let records = match self.execute_kw(&kwargs).await? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        let fetched = records.len() as u64;
        let reached_max = self.max_records.map_or(false, |max| offset + fetched >= max);
        if fetched == page_size && fetched > 0 && !reached_max {
            Ok(Page::more(records, PageMarker::Offset(offset + fetched)))
        } else {
            Ok(Page::last(records))
        }
    }
}

fn into_records(result: Value) -> Vec<Value> {
    match result {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(_) => item,
                other => json!({ "result": other }),
            })
            .collect(),
        Value::Null => Vec::new(),
        Value::Object(map) => vec![Value::Object(map)],
        other => vec![json!({ "result": other })],
    }
}

#[async_trait]
impl Adapter for OdooAdapter {
    fn product(&self) -> Product {
        Product::Odoo
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let mut call = OdooCall::from_query(query)?;
        let uid = match params.get_int("uid")? {
            Some(uid) => Value::from(uid),
            None => return Err(GatewayError::Validation("missing connection parameter 'uid'".into())),
        };

        let paged = call.method == "search_read";
        let max_records = call
            .kwargs
            .remove("limit")
            .and_then(|v| v.as_u64())
            .or(query.hints.limit);
        let page_size = call
            .kwargs
            .remove("page_size")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .max(1);
        call.kwargs.remove("offset");

        let session = OdooSession {
            client: &self.client,
            endpoint: format!("{}/jsonrpc", base_url(&params.require("url")?)),
            db: params.require("db")?,
            uid,
            key: params.require("key")?,
            call,
            page_size: max_records.map_or(page_size, |max| page_size.min(max.max(1))),
            max_records,
            request_id: AtomicU64::new(1),
        };

        let records = if paged {
            drain(&session).await?
        } else {
            let mut kwargs = session.call.kwargs.clone();
            if let Some(limit) = max_records {
                if session.call.method != "search_count" && session.call.method != "fields_get" {
                    kwargs.insert("limit".into(), Value::from(limit));
                }
            }
            into_records(session.execute_kw(&kwargs).await?)
        };

        Ok(NativeResult::Documents(
            records.into_iter().map(NativeValue::Json).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(url: String) -> ConnectionParams {
        ConnectionParams::new()
            .with("url", url)
            .with("db", "prod")
            .with("uid", 2i64)
            .with("key", "secret")
    }

    #[test]
    fn test_write_methods_rejected() {
        let query = LogicalQuery::new("odoo", r#"{"model": "res.partner", "method": "unlink"}"#);
        let err = OdooCall::from_query(&query).unwrap_err();
        assert!(err.to_string().contains("not allowed"));

        let query = LogicalQuery::new("odoo", r#"{"model": "res.partner"}"#);
        let call = OdooCall::from_query(&query).unwrap();
        assert_eq!(call.method, "search_read");
        assert_eq!(call.args, vec![json!([])]);
    }

    #[tokio::test]
    async fn test_search_read_pages_by_offset() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/jsonrpc"))
            .and(body_partial_json(json!({
                "params": {"args": ["prod", 2, "secret", "res.partner", "search_read", [[]], {"offset": 0, "limit": 2, "fields": ["name"]}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/jsonrpc"))
            .and(body_partial_json(json!({
                "params": {"args": ["prod", 2, "secret", "res.partner", "search_read", [[]], {"offset": 2, "limit": 2, "fields": ["name"]}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 2, "result": [{"id": 3, "name": "C"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OdooAdapter::new(http::client().unwrap());
        let query = LogicalQuery::new(
            "odoo",
            r#"{"model": "res.partner", "fields": ["name"], "page_size": 2}"#,
        );
        let records = adapter.execute(&credentials(server.uri()), &query).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].get("name"), Some(&json!("C")));
    }

    #[tokio::test]
    async fn test_rpc_error_is_adapter_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsonrpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": {"message": "Odoo Server Error", "data": {"message": "Access Denied"}}
            })))
            .mount(&server)
            .await;

        let adapter = OdooAdapter::new(http::client().unwrap());
        let query = LogicalQuery::new("odoo", r#"{"model": "res.partner"}"#);
        let err = adapter.execute(&credentials(server.uri()), &query).await.unwrap_err();
        assert!(matches!(err, GatewayError::Adapter { .. }));
        assert!(err.to_string().contains("Access Denied"));
    }

    #[tokio::test]
    async fn test_search_count_scalar_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsonrpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": 42
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = OdooAdapter::new(http::client().unwrap());
        let query = LogicalQuery::new("odoo", r#"{"model": "sale.order", "method": "search_count"}"#);
        let records = adapter.execute(&credentials(server.uri()), &query).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("result"), Some(&json!(42)));
    }
}
