//! SAP S/4HANA OData adapter (`__next` / `@odata.nextLink` pagination)

use async_trait::async_trait;
use once_cell::sync::Lazy;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use regex::Regex;
use reqwest::{Client, Url};
use serde_json::{Map, Value};

use super::pagination::{drain, Page, PageMarker, PageSource};
use crate::adapters::http::{base_url, flatten_params, send_json};
use crate::adapters::Adapter;

const DEFAULT_BASE_URL: &str = "https://sandbox.api.sap.com/s4hanacloud/sap/opu/odata/sap";

static SERVICE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9_]+$").expect("Invalid regex"));
static ENTITY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex"));

pub struct SapAdapter {
    client: Client,
    base_url: Option<String>,
}

impl SapAdapter {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: Some(base_url.into().trim_end_matches('/').to_string()),
        }
    }
}

fn take_name(params: &mut Map<String, Value>, key: &str, pattern: &Regex) -> Result<String> {
    let name = params
        .remove(key)
        .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GatewayError::Validation(format!("sap requires \"{}\"", key)))?;
    if !pattern.is_match(&name) {
        return Err(GatewayError::Validation(format!("invalid SAP {} '{}'", key, name)));
    }
    Ok(name)
}

struct SapPages<'a> {
    client: &'a Client,
    url: String,
    api_key: String,
    params: Vec<(String, String)>,
}

impl SapPages<'_> {
    /// Resolve a possibly relative next link against the entity set URL.
    fn resolve(&self, next: &str) -> Result<String> {
        let base = Url::parse(&self.url)
            .map_err(|e| GatewayError::adapter(Product::Sap.as_str(), e))?;
        base.join(next)
            .map(String::from)
            .map_err(|e| GatewayError::adapter(Product::Sap.as_str(), e))
    }
}

#[async_trait]
impl PageSource for SapPages<'_> {
    fn product(&self) -> Product {
        Product::Sap
    }

    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page> {
        let request = match marker {
            Some(PageMarker::NextUrl(url)) => self.client.get(url),
            _ => self.client.get(&self.url).query(&self.params),
        };
        let request = request
            .header("APIKey", &self.api_key)
            .header("Accept", "application/json");

        let (_, mut body) = send_json(Product::Sap, request).await?;
        let (records, next) = match body.get_mut("d") {
            // OData V2
            Some(d) => {
                let next = d.get("__next").and_then(Value::as_str).map(str::to_string);
                let records = match d.get_mut("results").map(Value::take) {
                    Some(Value::Array(items)) => items,
                    _ => vec![d.take()],
                };
                (records, next)
            }
            // OData V4
            None => {
                let next = body
                    .get("@odata.nextLink")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let records = match body.get_mut("value").map(Value::take) {
                    Some(Value::Array(items)) => items,
                    _ => vec![body],
                };
                (records, next)
            }
        };

        let records = records.into_iter().map(strip_metadata).collect();
        match next {
            Some(next) => Ok(Page::more(records, PageMarker::NextUrl(self.resolve(&next)?))),
            None => Ok(Page::last(records)),
        }
    }
}

fn strip_metadata(mut record: Value) -> Value {
    if let Value::Object(map) = &mut record {
        map.remove("__metadata");
    }
    record
}

#[async_trait]
impl Adapter for SapAdapter {
    fn product(&self) -> Product {
        Product::Sap
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let api_key = params.require("api_key")?;
        let base = match &self.base_url {
            Some(url) => url.clone(),
            None => base_url(&params.get("base_url").unwrap_or_else(|| DEFAULT_BASE_URL.to_string())),
        };

        let mut request_params = query.params()?;
        let service = take_name(&mut request_params, "service", &SERVICE_NAME)?;
        if !request_params.contains_key("entity") {
            if let Some(table) = query.table_hint() {
                request_params.insert("entity".into(), Value::String(table.to_string()));
            }
        }
        let entity = take_name(&mut request_params, "entity", &ENTITY_NAME)?;
        if let Some(limit) = query.hints.limit {
            request_params.entry("$top").or_insert_with(|| Value::from(limit));
        }
        request_params
            .entry("$format")
            .or_insert_with(|| Value::String("json".into()));

        let pages = SapPages {
            client: &self.client,
            url: format!("{}/{}/{}", base, service, entity),
            api_key,
            params: flatten_params(&request_params),
        };
        let records = drain(&pages).await?;
        Ok(NativeResult::Documents(
            records.into_iter().map(NativeValue::Json).collect(),
        ))
    }
}
