//! HubSpot CRM objects adapter (`paging.next.after` cursor)

use async_trait::async_trait;
use querygate_core::{ConnectionParams, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::Client;
use serde_json::{Map, Value};

use super::pagination::{drain, Page, PageMarker, PageSource};
use crate::adapters::http::{flatten_params, send_json, take_endpoint};
use crate::adapters::Adapter;

const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";
const DEFAULT_PAGE_SIZE: u64 = 100;

pub struct HubspotAdapter {
    client: Client,
    base_url: String,
}

impl HubspotAdapter {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// List objects with GET, or run the search endpoint when filters are supplied.
enum HubspotRequest {
    List(Vec<(String, String)>),
    Search(Map<String, Value>),
}

struct HubspotPages<'a> {
    client: &'a Client,
    url: String,
    token: String,
    request: HubspotRequest,
}

#[async_trait]
impl PageSource for HubspotPages<'_> {
    fn product(&self) -> Product {
        Product::Hubspot
    }

    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page> {
        let after = match marker {
            Some(PageMarker::Token(after)) => Some(after.as_str()),
            _ => None,
        };
        let request = match &self.request {
            HubspotRequest::List(params) => {
                let mut request = self.client.get(&self.url).query(params);
                if let Some(after) = after {
                    request = request.query(&[("after", after)]);
                }
                request
            }
            HubspotRequest::Search(body) => {
                let mut body = body.clone();
                if let Some(after) = after {
                    body.insert("after".into(), Value::String(after.to_string()));
                }
                self.client.post(format!("{}/search", self.url)).json(&body)
            }
        };

        let (_, body) = send_json(Product::Hubspot, request.bearer_auth(&self.token)).await?;
        let records = body
            .get("results")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(flatten_object).collect())
            .unwrap_or_default();
        match body.pointer("/paging/next/after") {
            Some(Value::String(after)) => Ok(Page::more(records, PageMarker::Token(after.clone()))),
            Some(Value::Number(after)) => Ok(Page::more(records, PageMarker::Token(after.to_string()))),
            _ => Ok(Page::last(records)),
        }
    }
}

/// `properties` lifted to the top level next to `id` and the timestamps.
fn flatten_object(object: &Value) -> Value {
    let mut flat = Map::new();
    for key in ["id", "createdAt", "updatedAt", "archived"] {
        if let Some(value) = object.get(key) {
            flat.insert(key.to_string(), value.clone());
        }
    }
    if let Some(properties) = object.get("properties").and_then(Value::as_object) {
        for (key, value) in properties {
            flat.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    Value::Object(flat)
}

#[async_trait]
impl Adapter for HubspotAdapter {
    fn product(&self) -> Product {
        Product::Hubspot
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let token = params.require("access_token")?;

        let mut request_params = query.params()?;
        let object_type = take_endpoint(Product::Hubspot, query, &mut request_params)?;
        let object_type = object_type
            .trim_start_matches("crm/v3/objects/")
            .to_string();
        request_params
            .entry("limit")
            .or_insert_with(|| Value::from(query.hints.limit.unwrap_or(DEFAULT_PAGE_SIZE)));

        let request = if request_params.contains_key("filterGroups") {
            HubspotRequest::Search(request_params)
        } else {
            HubspotRequest::List(flatten_params(&request_params))
        };

        let pages = HubspotPages {
            client: &self.client,
            url: format!("{}/crm/v3/objects/{}", self.base_url, object_type),
            token,
            request,
        };
        let records = drain(&pages).await?;
        Ok(NativeResult::Documents(
            records.into_iter().map(NativeValue::Json).collect(),
        ))
    }
}
