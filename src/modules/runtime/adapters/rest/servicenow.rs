//! ServiceNow adapter (`sysparm_offset` pagination)

use async_trait::async_trait;
use querygate_core::{ConnectionParams, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::Client;

use super::pagination::{drain, Page, PageMarker, PageSource};
use crate::adapters::http::{base_url, extract_records, flatten_params, next_link, send_json, take_endpoint};
use crate::adapters::Adapter;

const DEFAULT_PAGE_SIZE: u64 = 1_000;

pub struct ServicenowAdapter {
    client: Client,
}

impl ServicenowAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// `dev1234` expands to the hosted instance; anything else is used as given.
fn instance_url(instance: &str) -> String {
    let instance = instance.trim();
    if instance.contains('.') || instance.contains("://") {
        base_url(instance)
    } else {
        format!("https://{}.service-now.com", instance)
    }
}

struct ServicenowPages<'a> {
    client: &'a Client,
    url: String,
    username: String,
    password: String,
    page_size: u64,
    params: Vec<(String, String)>,
}

#[async_trait]
impl PageSource for ServicenowPages<'_> {
    fn product(&self) -> Product {
        Product::Servicenow
    }

    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page> {
        let offset = match marker {
            Some(PageMarker::Offset(n)) => *n,
            _ => 0,
        };
        let request = self
            .client
            .get(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .query(&self.params)
            .query(&[("sysparm_limit", self.page_size), ("sysparm_offset", offset)]);

        let (headers, body) = send_json(Product::Servicenow, request).await?;
        let records = extract_records(body);
        let fetched = records.len() as u64;
        if fetched > 0 && (next_link(&headers).is_some() || fetched == self.page_size) {
            Ok(Page::more(records, PageMarker::Offset(offset + fetched)))
        } else {
            Ok(Page::last(records))
        }
    }
}

#[async_trait]
impl Adapter for ServicenowAdapter {
    fn product(&self) -> Product {
        Product::Servicenow
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let instance = instance_url(&params.require("instance")?);

        let mut request_params = query.params()?;
        let endpoint = take_endpoint(Product::Servicenow, query, &mut request_params)?;
        let page_size = request_params
            .remove("sysparm_limit")
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .or(query.hints.limit)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .max(1);
        request_params.remove("sysparm_offset");

        let pages = ServicenowPages {
            client: &self.client,
            url: format!("{}/api/now/{}", instance, endpoint),
            username: params.require("username")?,
            password: params.require("password")?,
            page_size,
            params: flatten_params(&request_params),
        };
        let records = drain(&pages).await?;
        Ok(NativeResult::Documents(
            records.into_iter().map(NativeValue::Json).collect(),
        ))
    }
}
