//! Snowflake adapter over the SQL API v2
//!
//! Authenticates with a programmatic access token stored as the credential
//! `password`. Result sets larger than one partition are fetched partition by
//! partition through the statement handle.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use querygate_core::sql::IdentifierStyle;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tracing::debug;

use super::http::send_json;
use super::{sql_statement, Adapter};

const STATEMENT_TIMEOUT_SECS: u64 = 60;

pub struct SnowflakeAdapter {
    client: Client,
    base_url: Option<String>,
}

impl SnowflakeAdapter {
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

    fn account_url(&self, params: &ConnectionParams) -> Result<String> {
        if let Some(url) = &self.base_url {
            return Ok(url.clone());
        }
        let account = params.require("account")?;
        let account = account.trim().trim_end_matches('/');
        if account.contains("://") {
            Ok(account.to_string())
        } else {
            Ok(format!(
                "https://{}.snowflakecomputing.com",
                account.trim_end_matches(".snowflakecomputing.com")
            ))
        }
    }

    /// `"db"."schema"."table"` when database and schema resolve, otherwise `"table"`.
    fn table_reference(params: &ConnectionParams, query: &LogicalQuery) -> Result<Option<String>> {
        let Some(table) = query.table_hint().map(str::to_string).or_else(|| params.get("table")) else {
            return Ok(None);
        };
        let database = query.hints.database.clone().or_else(|| params.get("database"));
        let schema = query.hints.schema.clone().or_else(|| params.get("schema"));
        let parts = match (&database, &schema) {
            (Some(db), Some(schema)) => vec![Some(db.as_str()), Some(schema.as_str()), Some(table.as_str())],
            _ => vec![Some(table.as_str())],
        };
        IdentifierStyle::DoubleQuoted.qualify(&parts).map(Some)
    }
}

fn authorize(request: RequestBuilder, token: &str) -> RequestBuilder {
    request
        .bearer_auth(token)
        .header("X-Snowflake-Authorization-Token-Type", "PROGRAMMATIC_ACCESS_TOKEN")
        .header("Accept", "application/json")
}

#[async_trait]
impl Adapter for SnowflakeAdapter {
    fn product(&self) -> Product {
        Product::Snowflake
    }

    fn table_fallback(&self, params: &ConnectionParams) -> Option<String> {
        params.get("table")
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let table_ref = Self::table_reference(params, query)?;
        let statement = sql_statement(query, table_ref.as_deref())?;
        let base = self.account_url(params)?;
        let token = params.require("password")?;
        let product = Product::Snowflake.as_str();

        let mut body = json!({
            "statement": statement,
            "timeout": STATEMENT_TIMEOUT_SECS,
            "warehouse": params.require("warehouse")?,
            "database": query.hints.database.clone().or_else(|| params.get("database")),
            "schema": query.hints.schema.clone().or_else(|| params.get("schema")),
        });
        if let Some(role) = params.get("role") {
            body["role"] = Value::String(role);
        }
        debug!(product, statement = %statement, "Submitting statement");

        let request = authorize(
            self.client.post(format!("{}/api/v2/statements", base)).json(&body),
            &token,
        );
        let (_, first) = send_json(Product::Snowflake, request).await?;

        let Some(row_type) = first.pointer("/resultSetMetaData/rowType").and_then(Value::as_array) else {
            let message = first
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("statement did not return a result set");
            return Err(GatewayError::adapter(product, message));
        };
        let columns: Vec<(String, ColumnType)> = row_type
            .iter()
            .map(|col| {
                let name = col.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                (name, ColumnType::from_row_type(col))
            })
            .collect();

        let mut data = vec![first.get("data").cloned().unwrap_or(Value::Null)];
        let partitions = first
            .pointer("/resultSetMetaData/partitionInfo")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(1);
        if partitions > 1 {
            let handle = first
                .get("statementHandle")
                .and_then(Value::as_str)
                .ok_or_else(|| GatewayError::adapter(product, "missing statementHandle"))?;
            for partition in 1..partitions {
                let request = authorize(
                    self.client
                        .get(format!("{}/api/v2/statements/{}", base, handle))
                        .query(&[("partition", partition)]),
                    &token,
                );
                let (_, page) = send_json(Product::Snowflake, request).await?;
                data.push(page.get("data").cloned().unwrap_or(Value::Null));
            }
        }

        let rows = data
            .into_iter()
            .filter_map(|chunk| match chunk {
                Value::Array(rows) => Some(rows),
                _ => None,
            })
            .flatten()
            .map(|row| match row {
                Value::Array(cells) => cells
                    .into_iter()
                    .enumerate()
                    .map(|(i, cell)| match columns.get(i) {
                        Some((_, ty)) => ty.convert(cell),
                        None => NativeValue::Json(cell),
                    })
                    .collect(),
                other => vec![NativeValue::Json(other)],
            })
            .collect();

        Ok(NativeResult::Tabular {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            rows,
        })
    }
}

/// Column types as reported in `rowType`; cells arrive as strings.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColumnType {
    Fixed { scale: u64 },
    Real,
    Boolean,
    Date,
    Time,
    TimestampNtz,
    TimestampTz,
    Semi,
    Text,
}

impl ColumnType {
    fn from_row_type(col: &Value) -> Self {
        let scale = col.get("scale").and_then(Value::as_u64).unwrap_or(0);
        match col.get("type").and_then(Value::as_str).unwrap_or_default() {
            "fixed" => ColumnType::Fixed { scale },
            "real" => ColumnType::Real,
            "boolean" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "time" => ColumnType::Time,
            "timestamp_ntz" => ColumnType::TimestampNtz,
            "timestamp_ltz" | "timestamp_tz" => ColumnType::TimestampTz,
            "variant" | "object" | "array" => ColumnType::Semi,
            _ => ColumnType::Text,
        }
    }

    fn convert(self, cell: Value) -> NativeValue {
        let text = match cell {
            Value::Null => return NativeValue::Null,
            Value::String(text) => text,
            other => return NativeValue::Json(other),
        };
        let converted = match self {
            ColumnType::Fixed { scale: 0 } => text.parse().ok().map(NativeValue::Int),
            ColumnType::Fixed { .. } => Some(NativeValue::Decimal(text.clone())),
            ColumnType::Real => text.parse().ok().map(NativeValue::Float),
            ColumnType::Boolean => match text.as_str() {
                "true" | "1" => Some(NativeValue::Bool(true)),
                "false" | "0" => Some(NativeValue::Bool(false)),
                _ => None,
            },
            ColumnType::Date => text
                .parse::<i64>()
                .ok()
                .and_then(|days| NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days)))
                .map(NativeValue::Date),
            ColumnType::Time => split_epoch(&text).and_then(|(secs, nanos)| {
                NaiveTime::from_num_seconds_from_midnight_opt(u32::try_from(secs).ok()?, nanos)
                    .map(NativeValue::Time)
            }),
            ColumnType::TimestampNtz => split_epoch(&text)
                .and_then(|(secs, nanos)| DateTime::from_timestamp(secs, nanos))
                .map(|dt| NativeValue::LocalDateTime(dt.naive_utc())),
            ColumnType::TimestampTz => timestamp_tz(&text).map(NativeValue::DateTime),
            ColumnType::Semi => serde_json::from_str(&text).ok().map(NativeValue::Json),
            ColumnType::Text => None,
        };
        converted.unwrap_or(NativeValue::Text(text))
    }
}

/// `"1700000000.123456789"` into whole seconds and nanoseconds.
fn split_epoch(text: &str) -> Option<(i64, u32)> {
    let (secs, frac) = text.split_once('.').unwrap_or((text, ""));
    let secs = secs.parse().ok()?;
    let nanos = if frac.is_empty() {
        0
    } else {
        format!("{:0<9}", &frac[..frac.len().min(9)]).parse().ok()?
    };
    Some((secs, nanos))
}

/// `"<epoch> <offset minutes + 1440>"`; a missing offset means UTC.
fn timestamp_tz(text: &str) -> Option<DateTime<FixedOffset>> {
    let mut parts = text.split_whitespace();
    let (secs, nanos) = split_epoch(parts.next()?)?;
    let offset_minutes = match parts.next() {
        Some(raw) => raw.parse::<i32>().ok()? - 1440,
        None => 0,
    };
    let offset = FixedOffset::east_opt(offset_minutes * 60)?;
    let utc = DateTime::from_timestamp(secs, nanos)?;
    Some(offset.from_utc_datetime(&utc.naive_utc()))
}
