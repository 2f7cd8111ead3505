//! Freshworks adapter (page-number pagination driven by `Link` headers)

use async_trait::async_trait;
use querygate_core::{ConnectionParams, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::Client;
use serde_json::Value;

use super::pagination::{drain, Page, PageMarker, PageSource};
use crate::adapters::http::{base_url, extract_records, flatten_params, next_link, send_json, take_endpoint};
use crate::adapters::Adapter;

const DEFAULT_PER_PAGE: u64 = 100;

pub struct FreshworksAdapter {
    client: Client,
}

impl FreshworksAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

struct FreshworksPages<'a> {
    client: &'a Client,
    url: String,
    api_key: String,
    params: Vec<(String, String)>,
}

#[async_trait]
impl PageSource for FreshworksPages<'_> {
    fn product(&self) -> Product {
        Product::Freshworks
    }

    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page> {
        let request = match marker {
            Some(PageMarker::NextUrl(url)) => self.client.get(url),
            _ => self.client.get(&self.url).query(&self.params),
        };
        let request = request.header("Authorization", format!("Token token={}", self.api_key));

        let (headers, body) = send_json(Product::Freshworks, request).await?;
        let records = extract_records(body);
        match next_link(&headers) {
            Some(url) if !records.is_empty() => Ok(Page::more(records, PageMarker::NextUrl(url))),
            _ => Ok(Page::last(records)),
        }
    }
}

#[async_trait]
impl Adapter for FreshworksAdapter {
    fn product(&self) -> Product {
        Product::Freshworks
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let domain = base_url(&params.require("domain")?);
        let api_key = params.require("api_key")?;

        let mut request_params = query.params()?;
        let endpoint = take_endpoint(Product::Freshworks, query, &mut request_params)?;
        request_params
            .entry("per_page")
            .or_insert_with(|| Value::from(query.hints.limit.unwrap_or(DEFAULT_PER_PAGE)));
        request_params.entry("page").or_insert_with(|| Value::from(1));

        let pages = FreshworksPages {
            client: &self.client,
            url: format!("{}/api/v2/{}", domain, endpoint),
            api_key,
            params: flatten_params(&request_params),
        };
        let records = drain(&pages).await?;
        Ok(NativeResult::Documents(
            records.into_iter().map(NativeValue::Json).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_follows_link_header() {
        let server = MockServer::start().await;
        let next = format!("{}/api/v2/contacts?page=2&per_page=2", server.uri());

        Mock::given(method("GET"))
            .and(path("/api/v2/contacts"))
            .and(header("authorization", "Token token=fw-key"))
            .and(query_param("page", "1"))
            .and(query_param("per_page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", format!("<{}>; rel=\"next\"", next).as_str())
                    .set_body_json(json!([{"id": 1}, {"id": 2}])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/contacts"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 3}])))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = FreshworksAdapter::new(http::client().unwrap());
        let creds = ConnectionParams::new()
            .with("domain", server.uri())
            .with("api_key", "fw-key");
        let query = LogicalQuery::new("freshworks", r#"{"endpoint": "contacts"}"#).with_limit(2);
        let records = adapter.execute(&creds, &query).await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[2].get("id"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn test_wrapped_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/deals"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"deals": [{"id": 10}], "meta": {"total_pages": 1}})),
            )
            .mount(&server)
            .await;

        let adapter = FreshworksAdapter::new(http::client().unwrap());
        let creds = ConnectionParams::new()
            .with("domain", server.uri())
            .with("api_key", "k");
        let query = LogicalQuery::new("freshworks", "{}").with_table("deals");
        let records = adapter.execute(&creds, &query).await.unwrap();
        assert_eq!(records.len(), 1);
    }
}
