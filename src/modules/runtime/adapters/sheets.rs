//! Google Sheets adapter over the visualization query endpoint (`gviz/tq`)

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::{Product, QueryKind};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::http::send_text;
use super::Adapter;

const DEFAULT_BASE_URL: &str = "https://docs.google.com";

pub struct SheetsAdapter {
    client: Client,
    base_url: String,
}

impl SheetsAdapter {
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

fn sheets_error(message: impl ToString) -> GatewayError {
    GatewayError::adapter(Product::Googlesheet.as_str(), message)
}

/// Strip the `google.visualization.Query.setResponse(...)` wrapper.
fn unwrap_payload(body: &str) -> Result<Value> {
    let body = body.trim();
    if body.starts_with('{') {
        return serde_json::from_str(body).map_err(|e| sheets_error(format!("malformed payload: {}", e)));
    }
    let inner = match (body.find('('), body.rfind(')')) {
        (Some(start), Some(end)) if start < end => &body[start + 1..end],
        _ => match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => &body[start..=end],
            _ => return Err(sheets_error("response is not a visualization payload")),
        },
    };
    serde_json::from_str(inner).map_err(|e| sheets_error(format!("malformed payload: {}", e)))
}

/// Parse gviz `Date(y,m,d[,h,mi,s])` literals; months are zero-based.
fn gviz_date(raw: &str) -> Option<NativeValue> {
    let args = raw.strip_prefix("Date(")?.strip_suffix(')')?;
    let parts: Vec<u32> = args
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    let year = i32::try_from(*parts.first()?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, parts.get(1)? + 1, *parts.get(2)?)?;
    if parts.len() <= 3 {
        return Some(NativeValue::Date(date));
    }
    let get = |i: usize| parts.get(i).copied().unwrap_or(0);
    let time = NaiveTime::from_hms_opt(get(3), get(4), get(5))?;
    Some(NativeValue::LocalDateTime(date.and_time(time)))
}

fn cell_value(column_type: &str, cell: &Value) -> NativeValue {
    let v = match cell.get("v") {
        None | Some(Value::Null) => return NativeValue::Null,
        Some(v) => v,
    };
    match (column_type, v) {
        ("date" | "datetime", Value::String(raw)) => {
            gviz_date(raw).unwrap_or_else(|| NativeValue::Text(raw.clone()))
        }
        ("timeofday", Value::Array(parts)) => {
            let get = |i: usize| parts.get(i).and_then(Value::as_u64).unwrap_or(0) as u32;
            NaiveTime::from_hms_milli_opt(get(0), get(1), get(2), get(3))
                .map(NativeValue::Time)
                .unwrap_or_else(|| NativeValue::Json(v.clone()))
        }
        _ => NativeValue::Json(v.clone()),
    }
}

fn table_result(payload: &Value) -> Result<NativeResult> {
    if payload.get("status").and_then(Value::as_str) == Some("error") {
        let message = payload
            .pointer("/errors/0/detailed_message")
            .or_else(|| payload.pointer("/errors/0/message"))
            .and_then(Value::as_str)
            .unwrap_or("query failed");
        return Err(sheets_error(message));
    }

    let cols: Vec<(String, String)> = payload
        .pointer("/table/cols")
        .and_then(Value::as_array)
        .map(|cols| {
            cols.iter()
                .enumerate()
                .map(|(i, col)| {
                    let label = col
                        .get("label")
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("col_{}", i));
                    let ty = col.get("type").and_then(Value::as_str).unwrap_or("string");
                    (label, ty.to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    let rows = payload
        .pointer("/table/rows")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    let cells = row.get("c").and_then(Value::as_array);
                    cols.iter()
                        .enumerate()
                        .map(|(i, (_, ty))| {
                            cells
                                .and_then(|c| c.get(i))
                                .map(|cell| cell_value(ty, cell))
                                .unwrap_or(NativeValue::Null)
                        })
                        .collect()
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(NativeResult::Tabular {
        columns: cols.into_iter().map(|(label, _)| label).collect(),
        rows,
    })
}

#[async_trait]
impl Adapter for SheetsAdapter {
    fn product(&self) -> Product {
        Product::Googlesheet
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let tq = query.query_text(QueryKind::Formula)?;
        let sheet_id = params.require("sheet_id")?;
        let mut pairs = vec![("tq".to_string(), tq)];
        if let Some(sheet) = query.table_hint().map(str::to_string).or_else(|| params.get("sheet_name")) {
            pairs.push(("sheet".to_string(), sheet));
        }
        debug!(product = "googlesheet", "Running visualization query");

        let request = self
            .client
            .get(format!("{}/spreadsheets/d/{}/gviz/tq", self.base_url, sheet_id.trim()))
            .query(&pairs);
        let (_, body) = send_text(Product::Googlesheet, request).await?;
        table_result(&unwrap_payload(&body)?)
    }
}
