//! MongoDB adapter (`find` with a JSON filter)

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::Client;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, RawQuery, Result};
use querygate_types::Product;
use serde_json::Value;
use tracing::debug;

use super::Adapter;

pub struct MongodbAdapter;

impl MongodbAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MongodbAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn mongo_error(e: impl ToString) -> GatewayError {
    GatewayError::adapter(Product::Mongodb.as_str(), e)
}

/// Filter document from a JSON object or JSON-encoded text (extended JSON accepted).
fn filter_document(query: &LogicalQuery) -> Result<Document> {
    let value = match &query.raw_query {
        RawQuery::Mapping(map) => Value::Object(map.clone()),
        RawQuery::Text(text) if text.trim().is_empty() => return Ok(Document::new()),
        RawQuery::Text(text) => serde_json::from_str(text)
            .map_err(|e| GatewayError::Validation(format!("filter is not valid JSON: {}", e)))?,
    };
    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(_) => Err(GatewayError::Validation("filter must be a JSON object".to_string())),
        Err(e) => Err(GatewayError::Validation(format!("invalid filter: {}", e))),
    }
}

/// Convert a BSON value, flattening driver-specific types to JSON-safe forms.
fn bson_value(bson: Bson) -> NativeValue {
    match bson {
        Bson::Null | Bson::Undefined => NativeValue::Null,
        Bson::Boolean(b) => NativeValue::Bool(b),
        Bson::Int32(n) => NativeValue::Int(n.into()),
        Bson::Int64(n) => NativeValue::Int(n),
        Bson::Double(f) => NativeValue::Float(f),
        Bson::String(s) | Bson::Symbol(s) => NativeValue::Text(s),
        Bson::ObjectId(oid) => NativeValue::Id(oid.to_hex()),
        Bson::DateTime(dt) => chrono::DateTime::from_timestamp_millis(dt.timestamp_millis())
            .map(|d| NativeValue::DateTime(d.into()))
            .unwrap_or_else(|| NativeValue::Other(dt.to_string())),
        Bson::Decimal128(d) => NativeValue::Decimal(d.to_string()),
        Bson::Binary(bin) => NativeValue::Bytes(bin.bytes),
        Bson::Array(items) => NativeValue::List(items.into_iter().map(bson_value).collect()),
        Bson::Document(doc) => document_value(doc),
        Bson::JavaScriptCode(code) => NativeValue::Text(code),
        other => NativeValue::Other(other.to_string()),
    }
}

fn document_value(doc: Document) -> NativeValue {
    NativeValue::Map(doc.into_iter().map(|(k, v)| (k, bson_value(v))).collect())
}

#[async_trait]
impl Adapter for MongodbAdapter {
    fn product(&self) -> Product {
        Product::Mongodb
    }

    fn table_fallback(&self, params: &ConnectionParams) -> Option<String> {
        params.get("collection")
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let filter = filter_document(query)?;
        let database = match &query.hints.database {
            Some(db) => db.clone(),
            None => params.require("database")?,
        };
        let collection = match query.table_hint() {
            Some(name) => name.to_string(),
            None => params.require("collection")?,
        };
        let mut find_options = FindOptions::default();
        find_options.limit = query.hints.limit.and_then(|n| i64::try_from(n).ok());
        debug!(database = %database, collection = %collection, "Running find");

        let options = ClientOptions::parse(params.require("uri")?)
            .await
            .map_err(|e| GatewayError::Validation(format!("invalid mongodb uri: {}", e)))?;
        let client = Client::with_options(options).map_err(mongo_error)?;

        let result = async {
            let mut cursor = client
                .database(&database)
                .collection::<Document>(&collection)
                .find(filter, find_options)
                .await?;
            let mut docs = Vec::new();
            while let Some(doc) = cursor.try_next().await? {
                docs.push(document_value(doc));
            }
            Ok::<_, mongodb::error::Error>(docs)
        }
        .await;
        client.shutdown().await;

        result.map(NativeResult::Documents).map_err(mongo_error)
    }
}
