//! MySQL adapter

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use querygate_core::sql::IdentifierStyle;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use sqlx::mysql::{MySql, MySqlColumn, MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::{Column, Connection, Decode, Row, Type, TypeInfo};
use std::str::FromStr;
use tracing::{debug, warn};

use super::{sql_statement, Adapter};

const DEFAULT_PORT: u16 = 3306;

pub struct MysqlAdapter;

impl MysqlAdapter {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(params: &ConnectionParams) -> Result<MySqlConnectOptions> {
        let mut options = MySqlConnectOptions::new()
            .host(&params.require("host")?)
            .port(params.port(DEFAULT_PORT)?)
            .username(&params.require("user")?)
            .password(&params.require("password")?)
            .database(&params.require("database")?);
        if let Some(mode) = params.get("ssl_mode") {
            let mode = MySqlSslMode::from_str(&mode)
                .map_err(|_| GatewayError::Validation(format!("invalid ssl_mode '{}'", mode)))?;
            options = options.ssl_mode(mode);
        }
        Ok(options)
    }

    fn table_reference(query: &LogicalQuery) -> Result<Option<String>> {
        match query.table_hint() {
            None => Ok(None),
            Some(table) => {
                let schema = query.hints.schema.as_deref().or(query.hints.database.as_deref());
                IdentifierStyle::Backtick.qualify(&[schema, Some(table)]).map(Some)
            }
        }
    }
}

impl Default for MysqlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MysqlAdapter {
    fn product(&self) -> Product {
        Product::Mysql
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let table_ref = Self::table_reference(query)?;
        let statement = sql_statement(query, table_ref.as_deref())?;
        let options = Self::connect_options(params)?;
        let product = Product::Mysql.as_str();
        debug!(product, statement = %statement, "Executing statement");

        let mut conn = MySqlConnection::connect_with(&options)
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

fn decode<'r, T>(row: &'r MySqlRow, idx: usize, convert: impl FnOnce(T) -> NativeValue) -> NativeValue
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(value)) => convert(value),
        Ok(None) => NativeValue::Null,
        Err(_) => unchecked_value(row, idx),
    }
}

fn column_value(row: &MySqlRow, column: &MySqlColumn) -> NativeValue {
    let idx = column.ordinal();
    let type_name = column.type_info().name();
    match type_name {
        "BOOLEAN" => decode::<bool>(row, idx, NativeValue::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            decode::<i64>(row, idx, NativeValue::Int)
        }
        name if name.ends_with("UNSIGNED") => decode::<u64>(row, idx, NativeValue::UInt),
        "FLOAT" => decode::<f32>(row, idx, |v| NativeValue::Float(v.into())),
        "DOUBLE" => decode::<f64>(row, idx, NativeValue::Float),
        "DECIMAL" => match row.try_get_unchecked::<Option<String>, _>(idx) {
            Ok(Some(text)) => NativeValue::Decimal(text),
            Ok(None) => NativeValue::Null,
            Err(_) => unchecked_value(row, idx),
        },
        "DATETIME" => decode::<NaiveDateTime>(row, idx, NativeValue::LocalDateTime),
        "TIMESTAMP" => decode::<DateTime<Utc>>(row, idx, |v| NativeValue::DateTime(v.into())),
        "DATE" => decode::<NaiveDate>(row, idx, NativeValue::Date),
        "TIME" => decode::<NaiveTime>(row, idx, NativeValue::Time),
        "JSON" => decode::<serde_json::Value>(row, idx, NativeValue::Json),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            decode::<Vec<u8>>(row, idx, NativeValue::Bytes)
        }
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            decode::<String>(row, idx, NativeValue::Text)
        }
        _ => unchecked_value(row, idx),
    }
}

/// Text if the raw value is UTF-8, raw bytes otherwise.
fn unchecked_value(row: &MySqlRow, idx: usize) -> NativeValue {
    if let Ok(text) = row.try_get_unchecked::<Option<String>, _>(idx) {
        return text.map(NativeValue::Text).unwrap_or(NativeValue::Null);
    }
    match row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
        Ok(Some(bytes)) => NativeValue::Bytes(bytes),
        Ok(None) => NativeValue::Null,
        Err(e) => NativeValue::Other(e.to_string()),
    }
}
