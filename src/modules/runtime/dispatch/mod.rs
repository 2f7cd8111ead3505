//! Dispatch router
//!
//! Takes one inbound request through credential resolution, the safety gate
//! and a single adapter call, and always answers with a [`ResultEnvelope`].

use futures::FutureExt;
use querygate_core::{
    CredentialFilter, GatewayError, LogicalQuery, QueryHints, RawQuery, Result, SafetyGate,
};
use querygate_types::{Category, NormalizedRecord, Product, QueryRequest, ResultEnvelope};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::adapters::AdapterRegistry;
use crate::store::CredentialStore;

/// Message returned when no credential matches the requested product.
pub const INVALID_PRODUCT: &str = "Invalid productType";
pub const QUERY_REQUIRED: &str = "query parameter is required";

/// Per-request progress, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    CredentialsResolved,
    Validated,
    Executing,
    Normalized,
    Responded,
}

/// Everything the route layer extracts from one request.
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    pub category: String,
    pub product_name: String,
    pub raw_query: Option<Value>,
    pub hints: QueryHints,
    pub owner_id: Option<String>,
    pub connection_id: Option<String>,
}

impl DispatchRequest {
    pub fn new(category: impl Into<String>, product_name: impl Into<String>, raw_query: impl Into<Value>) -> Self {
        Self {
            category: category.into(),
            product_name: product_name.into(),
            raw_query: Some(raw_query.into()),
            ..Default::default()
        }
    }

    /// Build from a route's path segments and a decoded [`QueryRequest`].
    pub fn from_query_request(category: &str, product_name: &str, request: QueryRequest) -> Self {
        Self {
            category: category.to_string(),
            product_name: product_name.to_string(),
            raw_query: request.query,
            hints: QueryHints {
                table: request.table,
                database: request.database,
                schema: request.schema,
                collection: request.collection,
                index: request.index,
                limit: request.limit,
            },
            owner_id: request.userid.filter(|s| !s.trim().is_empty()),
            connection_id: request.connection.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn with_hints(mut self, hints: QueryHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }
}

/// Resolves credentials, gates the query and runs exactly one adapter call.
pub struct Dispatcher {
    store: Arc<CredentialStore>,
    registry: Arc<AdapterRegistry>,
    gate: SafetyGate,
}

impl Dispatcher {
    pub fn new(store: Arc<CredentialStore>, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            store,
            registry,
            gate: SafetyGate::new(),
        }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Products with a registered adapter
    pub fn products(&self) -> Vec<Product> {
        self.registry.products()
    }

    /// Run one request to completion. Never fails: every error becomes an
    /// error envelope.
    pub async fn dispatch(&self, request: DispatchRequest) -> ResultEnvelope {
        let category = request.category.clone();
        let product = request.product_name.clone();

        match self.run(request).await {
            Ok(records) => {
                info!(
                    category = %category,
                    product = %product,
                    records = records.len(),
                    state = ?DispatchState::Responded,
                    "Dispatch succeeded"
                );
                ResultEnvelope::success(records)
            }
            Err(e) => {
                let message = match &e {
                    GatewayError::NotFound(_) => INVALID_PRODUCT.to_string(),
                    other => other.sanitized_message(),
                };
                if e.is_error() {
                    error!(category = %category, product = %product, error = %e, "Dispatch failed");
                } else {
                    warn!(category = %category, product = %product, error = %e, "Dispatch refused");
                }
                ResultEnvelope::error(e.kind(), message)
            }
        }
    }

    async fn run(&self, request: DispatchRequest) -> Result<Vec<NormalizedRecord>> {
        debug!(state = ?DispatchState::Received, product = %request.product_name, "Dispatching");

        let raw_query = match request.raw_query {
            None | Some(Value::Null) => return Err(GatewayError::Validation(QUERY_REQUIRED.to_string())),
            Some(value) => RawQuery::from_value(value)?,
        };
        let category = Category::from_str(&request.category).map_err(GatewayError::Validation)?;

        let mut filter = CredentialFilter::new(category).product(&request.product_name);
        if let Some(owner) = request.owner_id {
            filter = filter.owner(owner);
        }
        if let Some(connection) = request.connection_id {
            filter = filter.connection(connection);
        }
        let record = self.store.resolve(&filter).await?;
        debug!(state = ?DispatchState::CredentialsResolved, key = %record.key, "Resolved credentials");

        let product = Product::from_str(record.product_name())
            .map_err(|_| GatewayError::UnsupportedProduct(record.product_name().to_string()))?;
        let adapter = self.registry.get(product)?;
        let params = record.connection_params;

        let query = adapter.prepare(LogicalQuery {
            product_name: product.as_str().to_string(),
            raw_query,
            hints: request.hints,
        });

        // The product's own kind decides gating so a stored manifest cannot weaken it
        let kind = product.query_kind();
        if kind.is_gated() {
            let text = query.query_text(kind)?;
            let table = query
                .table_hint()
                .map(str::to_string)
                .or_else(|| adapter.table_fallback(&params));
            self.gate.validate(&text, product.as_str(), kind, table.as_deref())?;
            debug!(state = ?DispatchState::Validated, kind = %kind, "Query passed the safety gate");
        }

        debug!(state = ?DispatchState::Executing, product = %product, "Executing");
        let outcome = AssertUnwindSafe(adapter.execute(&params, &query))
            .catch_unwind()
            .await
            .map_err(|_| GatewayError::Internal(format!("{} adapter panicked", product)))?;
        let records = outcome?;
        debug!(state = ?DispatchState::Normalized, records = records.len(), "Normalized result");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Adapter;
    use async_trait::async_trait;
    use querygate_core::{
        CapabilityManifest, ConnectionParams, CredentialKey, NativeResult, NativeValue,
    };
    use querygate_types::{ErrorKind, Status};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Behaviour {
        Rows,
        Fail,
        Panic,
    }

    struct StubAdapter {
        product: Product,
        behaviour: Behaviour,
        calls: AtomicUsize,
        seen: Mutex<Vec<(ConnectionParams, LogicalQuery)>>,
    }

    impl StubAdapter {
        fn new(product: Product, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                product,
                behaviour,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Adapter for StubAdapter {
        fn product(&self) -> Product {
            self.product
        }

        fn table_fallback(&self, params: &ConnectionParams) -> Option<String> {
            params.get("table")
        }

        async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((params.clone(), query.clone()));
            match self.behaviour {
                Behaviour::Rows => Ok(NativeResult::Tabular {
                    columns: vec!["id".into(), "name".into()],
                    rows: vec![vec![NativeValue::Int(1), NativeValue::Text("a".into())]],
                }),
                Behaviour::Fail => Err(GatewayError::adapter("postgresql", "connection refused")),
                Behaviour::Panic => panic!("driver bug"),
            }
        }
    }

    fn pg_params(host: &str) -> ConnectionParams {
        ConnectionParams::new()
            .with("host", host)
            .with("port", 5432i64)
            .with("user", "app")
            .with("password", "secret")
            .with("database", "shop")
    }

    async fn setup(stub: Arc<StubAdapter>) -> Dispatcher {
        let store = Arc::new(CredentialStore::in_memory());
        store
            .upsert(
                CredentialKey::new(Category::Db, "user_001", "conn_001", "postgresql"),
                pg_params("first"),
                CapabilityManifest::for_product(Product::Postgresql),
            )
            .await
            .unwrap();
        let mut registry = AdapterRegistry::new();
        registry.register(stub);
        Dispatcher::new(store, Arc::new(registry))
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let stub = StubAdapter::new(Product::Postgresql, Behaviour::Rows);
        let dispatcher = setup(stub.clone()).await;

        let envelope = dispatcher
            .dispatch(DispatchRequest::new("db", "postgresql", "SELECT id, name FROM customers"))
            .await;
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"status": "success", "data": [{"id": 1, "name": "a"}]})
        );
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_product_never_reaches_an_adapter() {
        let stub = StubAdapter::new(Product::Postgresql, Behaviour::Rows);
        let dispatcher = setup(stub.clone()).await;

        let envelope = dispatcher
            .dispatch(DispatchRequest::new("db", "unknown_product", "SELECT 1 FROM t"))
            .await;
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"status": "error", "message": "Invalid productType"})
        );
        assert_eq!(envelope.status_code(), 400);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_query() {
        let stub = StubAdapter::new(Product::Postgresql, Behaviour::Rows);
        let dispatcher = setup(stub.clone()).await;

        let mut request = DispatchRequest::new("db", "postgresql", Value::Null);
        request.raw_query = None;
        let envelope = dispatcher.dispatch(request).await;
        assert_eq!(envelope.message.as_deref(), Some(QUERY_REQUIRED));
        assert_eq!(envelope.error_kind(), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_rejected_query_is_not_executed() {
        let stub = StubAdapter::new(Product::Postgresql, Behaviour::Rows);
        let dispatcher = setup(stub.clone()).await;

        let envelope = dispatcher
            .dispatch(DispatchRequest::new("db", "postgresql", "DROP TABLE users"))
            .await;
        assert_eq!(envelope.status, Status::Error);
        assert_eq!(envelope.error_kind(), Some(ErrorKind::Rejection));
        assert!(envelope.message.unwrap().contains("drop"));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_table_hint_satisfies_missing_from() {
        let stub = StubAdapter::new(Product::Postgresql, Behaviour::Rows);
        let dispatcher = setup(stub.clone()).await;

        let no_hint = dispatcher
            .dispatch(DispatchRequest::new("db", "postgresql", "SELECT id, name LIMIT 5"))
            .await;
        assert_eq!(no_hint.error_kind(), Some(ErrorKind::Rejection));

        let hints = QueryHints {
            table: Some("customers".into()),
            ..Default::default()
        };
        let envelope = dispatcher
            .dispatch(DispatchRequest::new("db", "postgresql", "SELECT id, name LIMIT 5").with_hints(hints))
            .await;
        assert!(envelope.is_success());
        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0].1.hints.table.as_deref(), Some("customers"));
    }

    #[tokio::test]
    async fn test_credential_table_satisfies_missing_from() {
        let stub = StubAdapter::new(Product::Supabase, Behaviour::Rows);
        let dispatcher = setup(stub.clone()).await;
        dispatcher
            .store()
            .upsert(
                CredentialKey::new(Category::Db, "user_001", "conn_002", "supabase"),
                ConnectionParams::new()
                    .with("uri", "postgres://x")
                    .with("schema", "public")
                    .with("table", "orders"),
                CapabilityManifest::for_product(Product::Supabase),
            )
            .await
            .unwrap();

        let envelope = dispatcher
            .dispatch(DispatchRequest::new("db", "supabase", "SELECT id LIMIT 5"))
            .await;
        assert!(envelope.is_success());
    }

    #[tokio::test]
    async fn test_adapter_error_is_wrapped() {
        let stub = StubAdapter::new(Product::Postgresql, Behaviour::Fail);
        let dispatcher = setup(stub).await;

        let envelope = dispatcher
            .dispatch(DispatchRequest::new("db", "postgresql", "SELECT * FROM t"))
            .await;
        assert_eq!(envelope.status_code(), 500);
        assert_eq!(
            envelope.message.as_deref(),
            Some("postgresql fetch failed: connection refused")
        );
    }

    #[tokio::test]
    async fn test_adapter_panic_becomes_envelope() {
        let stub = StubAdapter::new(Product::Postgresql, Behaviour::Panic);
        let dispatcher = setup(stub).await;

        let envelope = dispatcher
            .dispatch(DispatchRequest::new("db", "postgresql", "SELECT * FROM t"))
            .await;
        assert_eq!(envelope.error_kind(), Some(ErrorKind::Internal));
        assert_eq!(envelope.status_code(), 500);
    }

    #[tokio::test]
    async fn test_unsupported_product() {
        let stub = StubAdapter::new(Product::Mysql, Behaviour::Rows);
        let dispatcher = setup(stub).await;

        let envelope = dispatcher
            .dispatch(DispatchRequest::new("db", "postgresql", "SELECT * FROM t"))
            .await;
        assert_eq!(envelope.message.as_deref(), Some("Unsupported productType: postgresql"));
    }

    #[tokio::test]
    async fn test_ambiguous_match_uses_first_inserted() {
        let stub = StubAdapter::new(Product::Postgresql, Behaviour::Rows);
        let dispatcher = setup(stub.clone()).await;
        dispatcher
            .store()
            .upsert(
                CredentialKey::new(Category::Db, "user_002", "conn_009", "postgresql"),
                pg_params("second"),
                CapabilityManifest::for_product(Product::Postgresql),
            )
            .await
            .unwrap();

        dispatcher
            .dispatch(DispatchRequest::new("db", "postgresql", "SELECT * FROM t"))
            .await;
        dispatcher
            .dispatch(DispatchRequest::new("db", "postgresql", "SELECT * FROM t").owner("user_002"))
            .await;

        let seen = stub.seen.lock().unwrap();
        assert_eq!(seen[0].0.get("host").as_deref(), Some("first"));
        assert_eq!(seen[1].0.get("host").as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_from_query_request_drops_blank_ids() {
        let request: QueryRequest = serde_json::from_value(json!({
            "query": "SELECT 1 FROM t",
            "userid": "",
            "connection": "conn_001",
            "limit": 3
        }))
        .unwrap();
        let dispatch = DispatchRequest::from_query_request("db", "postgresql", request);
        assert!(dispatch.owner_id.is_none());
        assert_eq!(dispatch.connection_id.as_deref(), Some("conn_001"));
        assert_eq!(dispatch.hints.limit, Some(3));
    }
}
