//! Shopify Admin REST adapter (cursor links in the `Link` header)

use async_trait::async_trait;
use querygate_core::{ConnectionParams, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::Client;
use serde_json::Value;

use super::pagination::{drain, Page, PageMarker, PageSource};
use crate::adapters::http::{base_url, extract_records, flatten_params, next_link, send_json, take_endpoint};
use crate::adapters::Adapter;

const DEFAULT_PAGE_SIZE: u64 = 250;

pub struct ShopifyAdapter {
    client: Client,
}

impl ShopifyAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

struct ShopifyPages<'a> {
    client: &'a Client,
    url: String,
    token: String,
    params: Vec<(String, String)>,
}

#[async_trait]
impl PageSource for ShopifyPages<'_> {
    fn product(&self) -> Product {
        Product::Shopify
    }

    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page> {
        // Next links already carry page_info and limit; other filters are rejected with them.
        let request = match marker {
            Some(PageMarker::NextUrl(url)) => self.client.get(url),
            _ => self.client.get(&self.url).query(&self.params),
        };
        let request = request.header("X-Shopify-Access-Token", &self.token);

        let (headers, body) = send_json(Product::Shopify, request).await?;
        let records = extract_records(body);
        match next_link(&headers) {
            Some(url) => Ok(Page::more(records, PageMarker::NextUrl(url))),
            None => Ok(Page::last(records)),
        }
    }
}

#[async_trait]
impl Adapter for ShopifyAdapter {
    fn product(&self) -> Product {
        Product::Shopify
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let store = base_url(&params.require("store_url")?);

        let mut request_params = query.params()?;
        let endpoint = take_endpoint(Product::Shopify, query, &mut request_params)?;
        request_params
            .entry("limit")
            .or_insert_with(|| Value::from(query.hints.limit.unwrap_or(DEFAULT_PAGE_SIZE)));

        let pages = ShopifyPages {
            client: &self.client,
            url: format!("{}/{}", store, endpoint),
            token: params.require("access_token")?,
            params: flatten_params(&request_params),
        };
        let records = drain(&pages).await?;
        Ok(NativeResult::Documents(
            records.into_iter().map(NativeValue::Json).collect(),
        ))
    }
}
