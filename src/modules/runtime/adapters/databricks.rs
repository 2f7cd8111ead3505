//! Databricks SQL adapter over the statement execution API

use async_trait::async_trait;
use querygate_core::sql::IdentifierStyle;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::Product;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::http::{base_url, send_json};
use super::rest::pagination::MAX_PAGES;
use super::{sql_statement, Adapter};

const WAIT_TIMEOUT: &str = "50s";

pub struct DatabricksAdapter {
    client: Client,
}

impl DatabricksAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn table_reference(query: &LogicalQuery) -> Result<Option<String>> {
        match query.table_hint() {
            None => Ok(None),
            Some(table) => IdentifierStyle::Bare
                .qualify(&[
                    query.hints.database.as_deref(),
                    query.hints.schema.as_deref(),
                    Some(table),
                ])
                .map(Some),
        }
    }
}

/// Warehouse id from either the bare id or an HTTP path such as `/sql/1.0/warehouses/abc`.
fn warehouse_id(raw: &str) -> &str {
    raw.trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

fn statement_error(reply: &Value) -> Option<GatewayError> {
    let state = reply
        .pointer("/status/state")
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN");
    match state {
        "SUCCEEDED" => None,
        "PENDING" | "RUNNING" => Some(GatewayError::adapter(
            Product::Databricks.as_str(),
            format!("statement still {} after {}", state.to_lowercase(), WAIT_TIMEOUT),
        )),
        _ => {
            let message = reply
                .pointer("/status/error/message")
                .and_then(Value::as_str)
                .unwrap_or(state);
            Some(GatewayError::adapter(Product::Databricks.as_str(), message))
        }
    }
}

fn convert_cell(type_name: &str, cell: Value) -> NativeValue {
    let text = match cell {
        Value::Null => return NativeValue::Null,
        Value::String(text) => text,
        other => return NativeValue::Json(other),
    };
    let converted = match type_name {
        "TINYINT" | "SHORT" | "SMALLINT" | "INT" | "LONG" | "BIGINT" => {
            text.parse().ok().map(NativeValue::Int)
        }
        "FLOAT" | "DOUBLE" => text.parse().ok().map(NativeValue::Float),
        "DECIMAL" => Some(NativeValue::Decimal(text.clone())),
        "BOOLEAN" => text.parse().ok().map(NativeValue::Bool),
        "ARRAY" | "MAP" | "STRUCT" => serde_json::from_str(&text).ok().map(NativeValue::Json),
        _ => None,
    };
    converted.unwrap_or(NativeValue::Text(text))
}

fn data_rows(chunk: &mut Value) -> Vec<Value> {
    match chunk.get_mut("data_array").map(Value::take) {
        Some(Value::Array(rows)) => rows,
        _ => Vec::new(),
    }
}

fn next_chunk(chunk: &Value) -> Option<String> {
    chunk
        .get("next_chunk_internal_link")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl Adapter for DatabricksAdapter {
    fn product(&self) -> Product {
        Product::Databricks
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let table_ref = Self::table_reference(query)?;
        let statement = sql_statement(query, table_ref.as_deref())?;
        let base = base_url(&params.require("server_hostname")?);
        let token = params.require("token")?;
        let warehouse = params.require("warehouse_id")?;
        debug!(product = "databricks", statement = %statement, "Submitting statement");

        let mut body = json!({
            "statement": statement,
            "warehouse_id": warehouse_id(&warehouse),
            "wait_timeout": WAIT_TIMEOUT,
            "on_wait_timeout": "CANCEL",
            "disposition": "INLINE",
            "format": "JSON_ARRAY",
        });
        if let Some(catalog) = params.get("catalog") {
            body["catalog"] = Value::String(catalog);
        }
        if let Some(schema) = params.get("schema") {
            body["schema"] = Value::String(schema);
        }

        let request = self
            .client
            .post(format!("{}/api/2.0/sql/statements", base))
            .bearer_auth(&token)
            .json(&body);
        let (_, mut reply) = send_json(Product::Databricks, request).await?;
        if let Some(err) = statement_error(&reply) {
            return Err(err);
        }

        let columns: Vec<(String, String)> = reply
            .pointer("/manifest/schema/columns")
            .and_then(Value::as_array)
            .map(|cols| {
                cols.iter()
                    .map(|col| {
                        let name = col.get("name").and_then(Value::as_str).unwrap_or_default();
                        let ty = col.get("type_name").and_then(Value::as_str).unwrap_or_default();
                        (name.to_string(), ty.to_uppercase())
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut raw_rows = Vec::new();
        let mut next = None;
        if let Some(result) = reply.get_mut("result") {
            raw_rows.extend(data_rows(result));
            next = next_chunk(result);
        }
        let mut fetched = 1;
        while let Some(link) = next.take() {
            if fetched >= MAX_PAGES {
                return Err(GatewayError::adapter(
                    Product::Databricks.as_str(),
                    format!("result did not finish within {} chunks", MAX_PAGES),
                ));
            }
            let request = self.client.get(format!("{}{}", base, link)).bearer_auth(&token);
            let (_, mut chunk) = send_json(Product::Databricks, request).await?;
            raw_rows.extend(data_rows(&mut chunk));
            next = next_chunk(&chunk);
            fetched += 1;
        }

        let rows = raw_rows
            .into_iter()
            .map(|row| match row {
                Value::Array(cells) => cells
                    .into_iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        let ty = columns.get(i).map(|(_, ty)| ty.as_str()).unwrap_or("STRING");
                        convert_cell(ty, cell)
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
