//! Wix REST adapter (offset paging on `.../query` endpoints)

use async_trait::async_trait;
use querygate_core::{ConnectionParams, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Map, Value};

use super::pagination::{drain, Page, PageMarker, PageSource};
use crate::adapters::http::{extract_records, flatten_params, send_json, take_endpoint};
use crate::adapters::Adapter;

const DEFAULT_BASE_URL: &str = "https://www.wixapis.com";
const DEFAULT_PAGE_SIZE: u64 = 100;

pub struct WixAdapter {
    client: Client,
    base_url: String,
}

impl WixAdapter {
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

struct WixAuth {
    api_key: String,
    account_id: String,
    site_id: String,
}

impl WixAuth {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", &self.api_key)
            .header("wix-account-id", &self.account_id)
            .header("wix-site-id", &self.site_id)
    }
}

/// POST query endpoints, paged with `paging.offset`.
struct WixQueryPages<'a> {
    client: &'a Client,
    url: String,
    auth: WixAuth,
    body: Map<String, Value>,
    page_size: u64,
}

#[async_trait]
impl PageSource for WixQueryPages<'_> {
    fn product(&self) -> Product {
        Product::Wix
    }

    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page> {
        let offset = match marker {
            Some(PageMarker::Offset(n)) => *n,
            _ => 0,
        };
        let mut body = self.body.clone();
        let query = body
            .entry("query")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(query) = query {
            query.insert("paging".into(), json!({"limit": self.page_size, "offset": offset}));
        }

        let request = self.auth.apply(self.client.post(&self.url).json(&body));
        let (_, body) = send_json(Product::Wix, request).await?;
        let total = body
            .get("totalResults")
            .or_else(|| body.pointer("/metadata/total"))
            .or_else(|| body.pointer("/pagingMetadata/total"))
            .and_then(Value::as_u64);
        let records = extract_records(body);
        let next = offset + records.len() as u64;
        let more = match total {
            Some(total) => next < total,
            None => records.len() as u64 == self.page_size,
        };
        if more && !records.is_empty() {
            Ok(Page::more(records, PageMarker::Offset(next)))
        } else {
            Ok(Page::last(records))
        }
    }
}

#[async_trait]
impl Adapter for WixAdapter {
    fn product(&self) -> Product {
        Product::Wix
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let auth = WixAuth {
            api_key: params.require("api_key")?,
            account_id: params.require("account_id")?,
            site_id: params.require("site_id")?,
        };

        let mut request_params = query.params()?;
        let endpoint = take_endpoint(Product::Wix, query, &mut request_params)?;
        let url = format!("{}/{}", self.base_url, endpoint);

        let records = if endpoint.ends_with("/query") {
            let pages = WixQueryPages {
                client: &self.client,
                url,
                auth,
                body: request_params,
                page_size: query.hints.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, DEFAULT_PAGE_SIZE),
            };
            drain(&pages).await?
        } else {
            let request = auth.apply(self.client.get(&url).query(&flatten_params(&request_params)));
            let (_, body) = send_json(Product::Wix, request).await?;
            extract_records(body)
        };

        Ok(NativeResult::Documents(
            records.into_iter().map(NativeValue::Json).collect(),
        ))
    }
}
