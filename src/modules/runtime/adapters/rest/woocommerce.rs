//! WooCommerce REST adapter (`page` numbers bounded by `X-WP-TotalPages`)

use async_trait::async_trait;
use querygate_core::{ConnectionParams, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::Client;
use serde_json::Value;

use super::pagination::{drain, Page, PageMarker, PageSource};
use crate::adapters::http::{base_url, extract_records, flatten_params, send_json, take_endpoint};
use crate::adapters::Adapter;

const DEFAULT_PER_PAGE: u64 = 100;
const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

pub struct WoocommerceAdapter {
    client: Client,
}

impl WoocommerceAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

struct WoocommercePages<'a> {
    client: &'a Client,
    url: String,
    params: Vec<(String, String)>,
    per_page: u64,
}

#[async_trait]
impl PageSource for WoocommercePages<'_> {
    fn product(&self) -> Product {
        Product::Woocommerce
    }

    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page> {
        let page = match marker {
            Some(PageMarker::Page(n)) => *n,
            _ => 1,
        };
        let request = self
            .client
            .get(&self.url)
            .query(&self.params)
            .query(&[("page", page), ("per_page", self.per_page)]);

        let (headers, body) = send_json(Product::Woocommerce, request).await?;
        let records = extract_records(body);
        let total_pages = headers
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let more = match total_pages {
            Some(total) => page < total,
            None => records.len() as u64 == self.per_page,
        };
        if more && !records.is_empty() {
            Ok(Page::more(records, PageMarker::Page(page + 1)))
        } else {
            Ok(Page::last(records))
        }
    }
}

#[async_trait]
impl Adapter for WoocommerceAdapter {
    fn product(&self) -> Product {
        Product::Woocommerce
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let store = base_url(&params.require("url")?);

        let mut request_params = query.params()?;
        let endpoint = take_endpoint(Product::Woocommerce, query, &mut request_params)?;
        let per_page = request_params
            .remove("per_page")
            .and_then(|v| v.as_u64())
            .or(query.hints.limit)
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, DEFAULT_PER_PAGE);
        request_params.remove("page");
        request_params.insert("consumer_key".into(), Value::String(params.require("consumer_key")?));
        request_params.insert(
            "consumer_secret".into(),
            Value::String(params.require("consumer_secret")?),
        );

        let pages = WoocommercePages {
            client: &self.client,
            url: format!("{}/wp-json/wc/v3/{}", store, endpoint),
            params: flatten_params(&request_params),
            per_page,
        };
        let records = drain(&pages).await?;
        Ok(NativeResult::Documents(
            records.into_iter().map(NativeValue::Json).collect(),
        ))
    }
}
