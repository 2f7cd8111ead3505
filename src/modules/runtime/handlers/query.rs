//! Query dispatch handler

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    response::Response,
    Json,
};
use querygate_types::QueryRequest;
use tracing::info;

use super::{envelope_response, malformed_request};
use crate::dispatch::DispatchRequest;
use crate::state::AppState;

/// Handler for query dispatch requests
pub struct QueryHandler;

impl QueryHandler {
    /// Handle GET /query/{category}/{product}
    pub async fn get(
        State(state): State<AppState>,
        Path((category, product)): Path<(String, String)>,
        request: Result<Query<QueryRequest>, QueryRejection>,
    ) -> Response {
        match request {
            Ok(Query(request)) => Self::dispatch(state, category, product, request).await,
            Err(rejection) => malformed_request("query string", rejection.body_text()),
        }
    }

    /// Handle POST /query/{category}/{product}
    pub async fn post(
        State(state): State<AppState>,
        Path((category, product)): Path<(String, String)>,
        request: Result<Json<QueryRequest>, JsonRejection>,
    ) -> Response {
        match request {
            Ok(Json(request)) => Self::dispatch(state, category, product, request).await,
            Err(rejection) => malformed_request("JSON body", rejection.body_text()),
        }
    }

    async fn dispatch(
        state: AppState,
        category: String,
        product: String,
        request: QueryRequest,
    ) -> Response {
        info!("Query request: {}/{}", category, product);
        let request = DispatchRequest::from_query_request(&category, &product, request);
        envelope_response(state.dispatcher.dispatch(request).await)
    }
}
