//! HTTP server for Querygate

use axum::{
    extract::State,
    routing::{delete, get, put},
    Json, Router,
};
use querygate_core::{GatewayConfig, GatewayError, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::adapters::{http, AdapterRegistry};
use crate::dispatch::Dispatcher;
use crate::handlers::{CredentialsHandler, MetadataHandler, QueryHandler};
use crate::state::AppState;
use crate::store::CredentialStore;

const ROUTES: &[&str] = &[
    "GET  /query/{category}/{product}",
    "POST /query/{category}/{product}",
    "GET  /metadata?category=&productType=",
    "PUT  /credentials/{category}",
    "DELETE /credentials/{category}/{owner}/{connection}/{product}",
    "GET  /health",
];

/// Runtime server for Querygate
pub struct Runtime {
    config: Arc<GatewayConfig>,
    state: AppState,
}

/// Apply port override to a gateway configuration
fn apply_port_override(mut config: GatewayConfig, port_override: Option<u16>) -> GatewayConfig {
    if let Some(port) = port_override {
        config.server.port = Some(port.to_string());
    }
    config
}

impl Runtime {
    /// Create a new runtime from a gateway configuration
    pub async fn new(config: GatewayConfig) -> Result<Self> {
        Self::with_port_override(config, None).await
    }

    /// Create a new runtime with an optional port override
    pub async fn with_port_override(config: GatewayConfig, port_override: Option<u16>) -> Result<Self> {
        let store = Arc::new(CredentialStore::open(config.store.path()).await?);
        let registry = AdapterRegistry::with_defaults(http::client()?);
        Ok(Self::from_parts(
            apply_port_override(config, port_override),
            store,
            registry,
        ))
    }

    /// Assemble a runtime around an existing store and adapter registry.
    pub fn from_parts(config: GatewayConfig, store: Arc<CredentialStore>, registry: AdapterRegistry) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(store, Arc::new(registry)));
        let state = AppState::new(config.name.as_str(), dispatcher);
        Self {
            config: Arc::new(config),
            state,
        }
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let timeout = TimeoutLayer::new(self.config.server.request_timeout());

        Router::new()
            .route("/", get(Self::banner))
            .route(
                "/query/:category/:product",
                get(QueryHandler::get).post(QueryHandler::post),
            )
            .route("/metadata", get(MetadataHandler::handle))
            .route("/credentials/:category", put(CredentialsHandler::upsert))
            .route(
                "/credentials/:category/:owner/:connection/:product",
                delete(CredentialsHandler::delete),
            )
            .route("/health", get(Self::health_check))
            .with_state(self.state.clone())
            .layer(cors)
            .layer(timeout)
            .layer(TraceLayer::new_for_http())
    }

    async fn banner(State(state): State<AppState>) -> Json<Value> {
        Json(json!({
            "name": state.name.as_ref(),
            "version": env!("CARGO_PKG_VERSION"),
            "routes": ROUTES,
        }))
    }

    /// Health check endpoint
    async fn health_check() -> &'static str {
        "OK"
    }

    /// Start the server
    pub async fn run(&self) -> Result<()> {
        let host = self.config.server.host().to_string();
        let port = self.config.port();
        let app = self.build_router();

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|e| GatewayError::Server(format!("Failed to bind {}:{}: {}", host, port, e)))?;

        info!("Starting Querygate server on http://{}:{}", host, port);
        info!("Service: {}", self.config.name);
        info!("Products: {}", self.state.dispatcher.products().len());

        axum::serve(listener, app)
            .with_graceful_shutdown(Self::shutdown_signal())
            .await
            .map_err(|e| GatewayError::Server(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Wait for shutdown signal
    async fn shutdown_signal() {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to install CTRL+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                debug!("Received CTRL+C, shutting down...");
            }
            _ = terminate => {
                debug!("Received SIGTERM, shutting down...");
            }
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Adapter;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use querygate_core::{ConnectionParams, LogicalQuery, NativeResult, NativeValue};
    use querygate_types::Product;
    use tower::ServiceExt;

    struct FixedRows;

    #[async_trait]
    impl Adapter for FixedRows {
        fn product(&self) -> Product {
            Product::Postgresql
        }

        async fn fetch(&self, _params: &ConnectionParams, _query: &LogicalQuery) -> Result<NativeResult> {
            Ok(NativeResult::Tabular {
                columns: vec!["id".into()],
                rows: vec![vec![NativeValue::Int(7)]],
            })
        }
    }

    fn test_runtime() -> Runtime {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(FixedRows));
        Runtime::from_parts(
            GatewayConfig::new("test-gateway"),
            Arc::new(CredentialStore::in_memory()),
            registry,
        )
    }

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn pg_credential() -> Value {
        json!({
            "owner_id": "user_001",
            "connection_id": "conn_001",
            "product": "postgresql",
            "params": {
                "host": "localhost",
                "port": 5432,
                "user": "app",
                "password": "secret",
                "database": "shop"
            }
        })
    }

    #[test]
    fn test_apply_port_override() {
        let config = apply_port_override(GatewayConfig::new("test"), Some(3000));
        assert_eq!(config.port(), 3000);
        let config = apply_port_override(GatewayConfig::new("test"), None);
        assert_eq!(config.port(), 5000);
    }

    #[tokio::test]
    async fn test_health_and_banner() {
        let router = test_runtime().build_router();

        let (status, body) = call(&router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("OK"));

        let (status, body) = call(&router, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "test-gateway");
        assert!(body["routes"].as_array().unwrap().len() >= 5);
    }

    #[tokio::test]
    async fn test_query_requires_query_parameter() {
        let router = test_runtime().build_router();
        let (status, body) = call(&router, get("/query/db/postgresql")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"status": "error", "message": "query parameter is required"})
        );
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let router = test_runtime().build_router();
        let (status, body) = call(
            &router,
            get("/query/db/unknown_product?query=SELECT%201%20FROM%20t"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"status": "error", "message": "Invalid productType"}));
    }

    #[tokio::test]
    async fn test_credential_lifecycle_over_http() {
        let router = test_runtime().build_router();

        let (status, _) = call(&router, with_json("PUT", "/credentials/db", pg_credential())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &router,
            get("/query/db/postgresql?query=SELECT%20id%20FROM%20orders&userid=user_001"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "data": [{"id": 7}]}));

        let (status, body) = call(
            &router,
            with_json("POST", "/query/db/postgresql", json!({"query": "SELECT id FROM orders"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["id"], 7);

        let (status, body) = call(&router, get("/metadata?category=db&productType=postgresql")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["supported_query_kind"], "SQL");

        let (_, body) = call(&router, get("/metadata?category=db")).await;
        assert!(body["data"]["postgresql"].is_object());

        let delete_uri = "/credentials/db/user_001/conn_001/postgresql";
        let request = Request::builder()
            .method("DELETE")
            .uri(delete_uri)
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&router, request).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::builder()
            .method("DELETE")
            .uri(delete_uri)
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_rejected_query_over_http() {
        let router = test_runtime().build_router();
        call(&router, with_json("PUT", "/credentials/db", pg_credential())).await;

        let (status, body) = call(
            &router,
            with_json("POST", "/query/db/postgresql", json!({"query": "DELETE FROM orders"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("delete"));
    }

    #[tokio::test]
    async fn test_malformed_requests_use_error_envelope() {
        let router = test_runtime().build_router();

        let request = Request::builder()
            .method("POST")
            .uri("/query/db/postgresql")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"query": "#))
            .unwrap();
        let (status, body) = call(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().starts_with("Malformed JSON body"));

        let (status, body) = call(&router, get("/query/db/postgresql?query=x&limit=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().starts_with("Malformed query string"));

        let request = Request::builder()
            .method("PUT")
            .uri("/credentials/db")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let (status, body) = call(&router, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_incomplete_credential_rejected() {
        let router = test_runtime().build_router();
        let mut body = pg_credential();
        body["params"] = json!({"host": "localhost"});

        let (status, body) = call(&router, with_json("PUT", "/credentials/db", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = body["message"].as_str().unwrap();
        assert!(message.starts_with("Missing required fields for postgresql"));
        assert!(message.contains("password"));
    }

    #[tokio::test]
    async fn test_metadata_requires_category() {
        let router = test_runtime().build_router();
        let (status, body) = call(&router, get("/metadata")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "category parameter is required");

        let (status, body) = call(&router, get("/metadata?category=db&productType=neo4j")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid productType");
    }
}
