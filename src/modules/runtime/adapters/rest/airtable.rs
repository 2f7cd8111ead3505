//! Airtable adapter (offset-token pagination)

use async_trait::async_trait;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, RawQuery, Result};
use querygate_types::Product;
use reqwest::Client;
use serde_json::{Map, Value};

use super::pagination::{drain, Page, PageMarker, PageSource};
use crate::adapters::http::{flatten_params, send_json};
use crate::adapters::Adapter;

const DEFAULT_BASE_URL: &str = "https://api.airtable.com";

pub struct AirtableAdapter {
    client: Client,
    base_url: String,
}

impl AirtableAdapter {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Request parameters: a JSON mapping, or a bare formula used as `filterByFormula`.
    fn request_params(query: &LogicalQuery) -> Map<String, Value> {
        match &query.raw_query {
            RawQuery::Mapping(map) => map.clone(),
            RawQuery::Text(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                _ if text.trim().is_empty() => Map::new(),
                _ => {
                    let mut map = Map::new();
                    map.insert("filterByFormula".into(), Value::String(text.trim().to_string()));
                    map
                }
            },
        }
    }
}

struct AirtablePages<'a> {
    client: &'a Client,
    url: String,
    api_key: String,
    params: Vec<(String, String)>,
}

#[async_trait]
impl PageSource for AirtablePages<'_> {
    fn product(&self) -> Product {
        Product::Airtable
    }

    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page> {
        let mut request = self
            .client
            .get(&self.url)
            .bearer_auth(&self.api_key)
            .query(&self.params);
        if let Some(PageMarker::Token(offset)) = marker {
            request = request.query(&[("offset", offset)]);
        }

        let (_, body) = send_json(Product::Airtable, request).await?;
        let records = body
            .get("records")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        match body.get("offset").and_then(Value::as_str) {
            Some(offset) => Ok(Page::more(records, PageMarker::Token(offset.to_string()))),
            None => Ok(Page::last(records)),
        }
    }
}

/// `fields` merged with the record `id`.
fn flatten_record(record: Value) -> Value {
    let mut flat = record
        .get("fields")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    if let Some(id) = record.get("id") {
        flat.insert("id".into(), id.clone());
    }
    Value::Object(flat)
}

#[async_trait]
impl Adapter for AirtableAdapter {
    fn product(&self) -> Product {
        Product::Airtable
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let base_id = params.require("base_id")?;
        let api_key = params.require("api_key")?;

        let mut request_params = Self::request_params(query);
        let table = query
            .table_hint()
            .map(str::to_string)
            .or_else(|| {
                request_params
                    .remove("table")
                    .and_then(|v| v.as_str().map(str::to_string))
            })
            .ok_or_else(|| {
                GatewayError::Validation("airtable requires a table name".to_string())
            })?;
        if let Some(limit) = query.hints.limit {
            request_params
                .entry("maxRecords")
                .or_insert_with(|| Value::from(limit));
        }

        let pages = AirtablePages {
            client: &self.client,
            url: format!("{}/v0/{}/{}", self.base_url, base_id, table),
            api_key,
            params: flatten_params(&request_params),
        };
        let records = drain(&pages).await?;

        Ok(NativeResult::Documents(
            records
                .into_iter()
                .map(flatten_record)
                .map(NativeValue::Json)
                .collect(),
        ))
    }
}
