//! Drain-all pagination shared by REST adapters

use async_trait::async_trait;
use querygate_core::{GatewayError, Result};
use querygate_types::Product;
use serde_json::Value;
use tracing::debug;

/// Upper bound on pages fetched for one query.
pub const MAX_PAGES: usize = 1_000;

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMarker {
    /// Numeric offset into the result set
    Offset(u64),
    /// 1-based page number
    Page(u64),
    /// Opaque continuation token (Airtable `offset`, HubSpot `after`)
    Token(String),
    /// Absolute URL of the next page (Link headers, OData `__next`)
    NextUrl(String),
}

/// One page of results plus the marker for the following page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Value>,
    pub next: Option<PageMarker>,
}

impl Page {
    pub fn last(records: Vec<Value>) -> Self {
        Self { records, next: None }
    }

    pub fn more(records: Vec<Value>, next: PageMarker) -> Self {
        Self {
            records,
            next: Some(next),
        }
    }
}

/// A backend that serves results one page at a time.
#[async_trait]
pub trait PageSource: Send + Sync {
    fn product(&self) -> Product;

    /// Fetch the page starting at `marker` (`None` for the first page).
    async fn fetch_page(&self, marker: Option<&PageMarker>) -> Result<Page>;
}

/// Fetch every page and concatenate the records in order.
///
/// Stops at the first page without a marker. Results are held in memory
/// until the last page arrives.
pub async fn drain<S: PageSource + ?Sized>(source: &S) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    let mut marker: Option<PageMarker> = None;

    for page_no in 1..=MAX_PAGES {
        let page = source.fetch_page(marker.as_ref()).await?;
        debug!(
            product = %source.product(),
            page = page_no,
            records = page.records.len(),
            "Fetched page"
        );
        records.extend(page.records);
        match page.next {
            Some(next) if marker.as_ref() == Some(&next) => {
                return Err(GatewayError::adapter(
                    source.product().as_str(),
                    "backend repeated the same page marker",
                ));
            }
            Some(next) => marker = Some(next),
            None => return Ok(records),
        }
    }

    Err(GatewayError::adapter(
        source.product().as_str(),
        format!("pagination did not finish within {} pages", MAX_PAGES),
    ))
}
