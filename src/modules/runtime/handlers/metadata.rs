//! Capability manifest lookup

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use querygate_core::GatewayError;
use querygate_types::Category;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use super::{error_response, malformed_request};
use crate::dispatch::INVALID_PRODUCT;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MetadataQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "productType")]
    pub product_type: Option<String>,
}

/// Handler for manifest metadata
pub struct MetadataHandler;

impl MetadataHandler {
    /// Handle GET /metadata?category=&productType=
    ///
    /// With `productType` the single stored manifest is returned, otherwise a
    /// product to manifest map for the whole category.
    pub async fn handle(
        State(state): State<AppState>,
        query: Result<Query<MetadataQuery>, QueryRejection>,
    ) -> Response {
        let query = match query {
            Ok(Query(query)) => query,
            Err(rejection) => return malformed_request("query string", rejection.body_text()),
        };
        let category = match query.category.as_deref().map(Category::from_str) {
            Some(Ok(category)) => category,
            Some(Err(e)) => return error_response(&GatewayError::Validation(e)),
            None => {
                return error_response(&GatewayError::Validation(
                    "category parameter is required".to_string(),
                ))
            }
        };

        let data = match query.product_type.filter(|p| !p.trim().is_empty()) {
            Some(product) => match state.store.manifest(category, &product).await {
                Ok(manifest) => json!(manifest),
                Err(GatewayError::NotFound(_)) => {
                    return error_response(&GatewayError::NotFound(INVALID_PRODUCT.to_string()))
                }
                Err(e) => return error_response(&e),
            },
            None => match state.store.manifests(category).await {
                Ok(manifests) => json!(manifests),
                Err(e) => return error_response(&e),
            },
        };

        (StatusCode::OK, Json(json!({ "status": "success", "data": data }))).into_response()
    }
}
