//! Zoho adapter (refresh-token exchange, page-number pagination)

use async_trait::async_trait;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

use super::pagination::{drain, Page, PageMarker, PageSource};
use crate::adapters::http::{base_url, extract_records, flatten_params, send_json, take_endpoint};
use crate::adapters::Adapter;

const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.zoho.in";
const DEFAULT_API_URL: &str = "https://www.zohoapis.in";
const DEFAULT_PER_PAGE: u64 = 200;

pub struct ZohoAdapter {
    client: Client,
    accounts_url: Option<String>,
    api_url: Option<String>,
}

impl ZohoAdapter {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            accounts_url: None,
            api_url: None,
        }
    }

    /// Pin both the accounts (token) host and the API host.
    pub fn with_endpoints(
        client: Client,
        accounts_url: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            accounts_url: Some(base_url(&accounts_url.into())),
            api_url: Some(base_url(&api_url.into())),
        }
    }

    /// Exchange the stored refresh token for a short-lived access token.
    async fn access_token(&self, accounts_url: &str, params: &ConnectionParams) -> Result<String> {
        let form = [
            ("grant_type", "refresh_token".to_string()),
            ("client_id", params.require("client_id")?),
            ("client_secret", params.require("client_secret")?),
            ("refresh_token", params.require("refresh_token")?),
        ];
        let request = self
            .client
            .post(format!("{}/oauth/v2/token", accounts_url))
            .form(&form);
        let (_, body) = send_json(Product::Zoho, request)
            .await
            .map_err(|e| token_error(&e.to_string()))?;

        match body.get("access_token").and_then(Value::as_str) {
            Some(token) => Ok(token.to_string()),
            None => {
                let reason = body
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("no access_token in response");
                Err(token_error(reason))
            }
        }
    }
}

fn token_error(reason: &str) -> GatewayError {
    GatewayError::adapter(Product::Zoho.as_str(), format!("token exchange failed: {}", reason))
}

fn api_prefix(app: &str) -> Result<&'static str> {
    match app {
        "crm" => Ok("crm/v2"),
        "books" => Ok("books/v3"),
        "inventory" => Ok("inventory/v1"),
        other => Err(GatewayError::Validation(format!("unsupported Zoho app '{}'", other))),
    }
}

struct ZohoPages<'a> {
    client: &'a Client,
    url: String,
    token: String,
    params: Vec<(String, String)>,
}

#[async_trait]
impl PageSource for ZohoPages<'_> {
    fn product(&self) -> Product {
        Product::Zoho
    }

    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page> {
        let page = match marker {
            Some(PageMarker::Page(n)) => *n,
            _ => 1,
        };
        let request = self
            .client
            .get(&self.url)
            .header("Authorization", format!("Zoho-oauthtoken {}", self.token))
            .query(&self.params)
            .query(&[("page", page)]);

        let (_, mut body) = send_json(Product::Zoho, request).await?;
        let more = body
            .pointer("/info/more_records")
            .or_else(|| body.pointer("/page_context/has_more_page"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let records = match body.get_mut("data").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => extract_records(body),
        };

        if more {
            Ok(Page::more(records, PageMarker::Page(page + 1)))
        } else {
            Ok(Page::last(records))
        }
    }
}

#[async_trait]
impl Adapter for ZohoAdapter {
    fn product(&self) -> Product {
        Product::Zoho
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let mut request_params: Map<String, Value> = query.params()?;
        let endpoint = take_endpoint(Product::Zoho, query, &mut request_params)?;
        let app = request_params
            .remove("app")
            .and_then(|v| v.as_str().map(str::to_lowercase))
            .unwrap_or_else(|| "crm".to_string());
        let prefix = api_prefix(&app)?;

        request_params
            .entry("per_page")
            .or_insert_with(|| Value::from(query.hints.limit.unwrap_or(DEFAULT_PER_PAGE)));
        if let Some(org) = params.get("organization_id") {
            request_params
                .entry("organization_id")
                .or_insert(Value::String(org));
        }

        let accounts_url = match &self.accounts_url {
            Some(url) => url.clone(),
            None => base_url(&params.get("accounts_url").unwrap_or_else(|| DEFAULT_ACCOUNTS_URL.to_string())),
        };
        let api_url = match &self.api_url {
            Some(url) => url.clone(),
            None => base_url(&params.get("api_domain").unwrap_or_else(|| DEFAULT_API_URL.to_string())),
        };

        let token = self.access_token(&accounts_url, params).await?;
        debug!(app = %app, endpoint = %endpoint, "Zoho access token acquired");

        let pages = ZohoPages {
            client: &self.client,
            url: format!("{}/{}/{}", api_url, prefix, endpoint),
            token,
            params: flatten_params(&request_params),
        };
        let records = drain(&pages).await?;
        Ok(NativeResult::Documents(
            records.into_iter().map(NativeValue::Json).collect(),
        ))
    }
}
