//! Credential write endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use querygate_core::{CapabilityManifest, ConnectionParams, CredentialKey, GatewayError};
use querygate_types::{Category, Product};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use tracing::info;

use super::{error_response, malformed_request};
use crate::state::AppState;

/// Body of `PUT /credentials/{category}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialUpsert {
    #[serde(alias = "userid")]
    pub owner_id: String,
    #[serde(alias = "connection")]
    pub connection_id: String,
    #[serde(alias = "productType")]
    pub product: String,
    #[serde(default)]
    pub params: ConnectionParams,
    /// Defaults to the product's built-in manifest
    #[serde(default)]
    pub manifest: Option<CapabilityManifest>,
}

impl CredentialUpsert {
    fn manifest(&self) -> Result<CapabilityManifest, GatewayError> {
        match &self.manifest {
            Some(manifest) => Ok(manifest.clone()),
            None => Product::from_str(&self.product)
                .map(CapabilityManifest::for_product)
                .map_err(|_| {
                    GatewayError::Validation(format!(
                        "manifest is required for unknown product {}",
                        self.product
                    ))
                }),
        }
    }
}

fn parse_category(raw: &str) -> Result<Category, GatewayError> {
    Category::from_str(raw).map_err(GatewayError::Validation)
}

/// Handler for credential writes
pub struct CredentialsHandler;

impl CredentialsHandler {
    /// Handle PUT /credentials/{category}
    pub async fn upsert(
        State(state): State<AppState>,
        Path(category): Path<String>,
        body: Result<Json<CredentialUpsert>, JsonRejection>,
    ) -> Response {
        let body = match body {
            Ok(Json(body)) => body,
            Err(rejection) => return malformed_request("JSON body", rejection.body_text()),
        };
        match Self::store(&state, &category, body).await {
            Ok(key) => {
                info!("Credentials stored for {}", key);
                (
                    StatusCode::OK,
                    Json(json!({ "status": "success", "message": "Credentials stored" })),
                )
                    .into_response()
            }
            Err(e) => error_response(&e),
        }
    }

    async fn store(
        state: &AppState,
        category: &str,
        body: CredentialUpsert,
    ) -> Result<CredentialKey, GatewayError> {
        let category = parse_category(category)?;
        let manifest = body.manifest()?;
        let key = CredentialKey::new(category, body.owner_id, body.connection_id, &body.product);
        state.store.upsert(key.clone(), body.params, manifest).await?;
        Ok(key)
    }

    /// Handle DELETE /credentials/{category}/{owner}/{connection}/{product}
    pub async fn delete(
        State(state): State<AppState>,
        Path((category, owner, connection, product)): Path<(String, String, String, String)>,
    ) -> Response {
        let result = match parse_category(&category) {
            Ok(category) => {
                let key = CredentialKey::new(category, owner, connection, &product);
                state.store.delete(&key).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => (
                StatusCode::OK,
                Json(json!({ "status": "success", "message": "Credentials deleted" })),
            )
                .into_response(),
            Err(e) => error_response(&e),
        }
    }
}
