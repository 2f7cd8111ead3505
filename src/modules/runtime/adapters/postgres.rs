//! PostgreSQL-family adapter (PostgreSQL, Supabase, TimescaleDB)

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use querygate_core::sql::IdentifierStyle;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, RawQuery, Result};
use querygate_types::Product;
use sqlx::postgres::{PgColumn, PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column, Connection, Decode, Postgres, Row, Type, TypeInfo};
use std::str::FromStr;
use tracing::{debug, warn};

use super::{sql_statement, Adapter};

const DEFAULT_PORT: u16 = 5432;
const LIST_TABLES: &str = "LIST_TABLES";
const LIST_TABLES_SQL: &str =
    "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public' ORDER BY table_name";

/// One adapter type serves the whole Postgres wire-protocol family.
pub struct PostgresAdapter {
    product: Product,
}

impl PostgresAdapter {
    pub fn postgresql() -> Self {
        Self {
            product: Product::Postgresql,
        }
    }

    pub fn supabase() -> Self {
        Self {
            product: Product::Supabase,
        }
    }

    pub fn timescaledb() -> Self {
        Self {
            product: Product::Timescaledb,
        }
    }

    fn connect_options(&self, params: &ConnectionParams) -> Result<PgConnectOptions> {
        match self.product {
            Product::Supabase => {
                let uri = params.require("uri")?;
                let options = PgConnectOptions::from_str(&uri).map_err(|e| {
                    GatewayError::Validation(format!("invalid supabase uri: {}", e))
                })?;
                Ok(options.ssl_mode(PgSslMode::Require))
            }
            _ => {
                let mut options = PgConnectOptions::new()
                    .host(&params.require("host")?)
                    .port(params.port(DEFAULT_PORT)?)
                    .username(&params.require("user")?)
                    .password(&params.require("password")?)
                    .database(&params.require("database")?);
                if let Some(mode) = params.get("sslmode") {
                    let mode = PgSslMode::from_str(&mode).map_err(|_| {
                        GatewayError::Validation(format!("invalid sslmode '{}'", mode))
                    })?;
                    options = options.ssl_mode(mode);
                }
                Ok(options)
            }
        }
    }

    /// `"schema"."table"` from the hints, falling back to the credential for Supabase.
    fn table_reference(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<Option<String>> {
        let table = query
            .table_hint()
            .map(str::to_string)
            .or_else(|| self.table_fallback(params));
        let Some(table) = table else {
            return Ok(None);
        };
        let schema = query.hints.schema.clone().or_else(|| match self.product {
            Product::Supabase => params.get("schema"),
            _ => None,
        });
        IdentifierStyle::DoubleQuoted
            .qualify(&[schema.as_deref(), Some(&table)])
            .map(Some)
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn product(&self) -> Product {
        self.product
    }

    fn prepare(&self, mut query: LogicalQuery) -> LogicalQuery {
        if self.product == Product::Timescaledb {
            if let RawQuery::Text(text) = &query.raw_query {
                if text.trim().eq_ignore_ascii_case(LIST_TABLES) {
                    query.raw_query = RawQuery::Text(LIST_TABLES_SQL.to_string());
                }
            }
        }
        query
    }

    fn table_fallback(&self, params: &ConnectionParams) -> Option<String> {
        match self.product {
            Product::Supabase => params.get("table"),
            _ => None,
        }
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let table_ref = self.table_reference(params, query)?;
        let statement = sql_statement(query, table_ref.as_deref())?;
        let options = self.connect_options(params)?;
        let product = self.product.as_str();
        debug!(product, statement = %statement, "Executing statement");

        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| GatewayError::adapter(product, format!("connection failed: {}", e)))?;
        let result = sqlx::query(&statement).fetch_all(&mut conn).await;
        if let Err(e) = conn.close().await {
            warn!(product, error = %e, "Failed to close connection");
        }
        let rows = result.map_err(|e| GatewayError::adapter(product, e))?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .iter()
            .map(|row| row.columns().iter().map(|c| column_value(row, c)).collect())
            .collect();
        Ok(NativeResult::Tabular { columns, rows })
    }
}

fn decode<'r, T>(row: &'r PgRow, idx: usize, convert: impl FnOnce(T) -> NativeValue) -> NativeValue
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(value)) => convert(value),
        Ok(None) => NativeValue::Null,
        Err(_) => unchecked_value(row, idx),
    }
}

fn decode_array<'r, T>(row: &'r PgRow, idx: usize, convert: fn(T) -> NativeValue) -> NativeValue
where
    Vec<Option<T>>: Decode<'r, Postgres> + Type<Postgres>,
{
    decode::<Vec<Option<T>>>(row, idx, |items| {
        NativeValue::List(
            items
                .into_iter()
                .map(|item| item.map(convert).unwrap_or(NativeValue::Null))
                .collect(),
        )
    })
}

/// Convert one column by its declared type name.
fn column_value(row: &PgRow, column: &PgColumn) -> NativeValue {
    let idx = column.ordinal();
    match column.type_info().name() {
        "BOOL" => decode::<bool>(row, idx, NativeValue::Bool),
        "INT2" => decode::<i16>(row, idx, |v| NativeValue::Int(v.into())),
        "INT4" => decode::<i32>(row, idx, |v| NativeValue::Int(v.into())),
        "INT8" => decode::<i64>(row, idx, NativeValue::Int),
        "OID" => decode::<sqlx::postgres::types::Oid>(row, idx, |v| NativeValue::UInt(v.0.into())),
        "FLOAT4" => decode::<f32>(row, idx, |v| NativeValue::Float(v.into())),
        "FLOAT8" => decode::<f64>(row, idx, NativeValue::Float),
        "NUMERIC" => match row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
            Ok(None) => NativeValue::Null,
            Ok(Some(bytes)) => numeric_text(&bytes)
                .map(NativeValue::Decimal)
                .unwrap_or_else(|| NativeValue::Bytes(bytes)),
            Err(_) => NativeValue::Other("NUMERIC".to_string()),
        },
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => {
            decode::<String>(row, idx, NativeValue::Text)
        }
        "UUID" => decode::<uuid::Uuid>(row, idx, |v| NativeValue::Id(v.to_string())),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, idx, |v| NativeValue::DateTime(v.into())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, idx, NativeValue::LocalDateTime),
        "DATE" => decode::<NaiveDate>(row, idx, NativeValue::Date),
        "TIME" => decode::<NaiveTime>(row, idx, NativeValue::Time),
        "JSON" | "JSONB" => decode::<serde_json::Value>(row, idx, NativeValue::Json),
        "BYTEA" => decode::<Vec<u8>>(row, idx, NativeValue::Bytes),
        "BOOL[]" => decode_array::<bool>(row, idx, NativeValue::Bool),
        "INT2[]" => decode_array::<i16>(row, idx, |v| NativeValue::Int(v.into())),
        "INT4[]" => decode_array::<i32>(row, idx, |v| NativeValue::Int(v.into())),
        "INT8[]" => decode_array::<i64>(row, idx, NativeValue::Int),
        "FLOAT8[]" => decode_array::<f64>(row, idx, NativeValue::Float),
        "TEXT[]" | "VARCHAR[]" | "NAME[]" => decode_array::<String>(row, idx, NativeValue::Text),
        "UUID[]" => decode_array::<uuid::Uuid>(row, idx, |v| NativeValue::Id(v.to_string())),
        "JSONB[]" | "JSON[]" => decode_array::<serde_json::Value>(row, idx, NativeValue::Json),
        _ => unchecked_value(row, idx),
    }
}

/// Fallback for types without a dedicated decoder: text if it is UTF-8, raw bytes otherwise.
fn unchecked_value(row: &PgRow, idx: usize) -> NativeValue {
    if let Ok(text) = row.try_get_unchecked::<Option<String>, _>(idx) {
        return text.map(NativeValue::Text).unwrap_or(NativeValue::Null);
    }
    match row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
        Ok(Some(bytes)) => NativeValue::Bytes(bytes),
        Ok(None) => NativeValue::Null,
        Err(e) => NativeValue::Other(e.to_string()),
    }
}

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decimal text of a binary `NUMERIC` (base-10000 digit groups).
fn numeric_text(bytes: &[u8]) -> Option<String> {
    let read = |at: usize| -> Option<u16> {
        Some(u16::from_be_bytes([*bytes.get(at)?, *bytes.get(at + 1)?]))
    };
    let ndigits = read(0)? as usize;
    let weight = read(2)? as i16 as i64;
    let sign = read(4)?;
    let dscale = read(6)? as usize;

    match sign {
        NUMERIC_NAN => return Some("NaN".to_string()),
        NUMERIC_PINF => return Some("Infinity".to_string()),
        NUMERIC_NINF => return Some("-Infinity".to_string()),
        _ => {}
    }
    let digits = (0..ndigits)
        .map(|i| read(8 + i * 2))
        .collect::<Option<Vec<u16>>>()?;
    let group = |i: i64| -> u16 {
        if i < 0 {
            0
        } else {
            digits.get(i as usize).copied().unwrap_or(0)
        }
    };

    let mut text = String::new();
    if sign == NUMERIC_NEG {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&group(0).to_string());
        for i in 1..=weight {
            text.push_str(&format!("{:04}", group(i)));
        }
    }
    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", group(i)));
            i += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }
    Some(text)
}
