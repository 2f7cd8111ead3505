//! HTTP request handlers for the Querygate server
//!
//! Thin route layer: path and argument extraction, then a call into the
//! dispatcher or the credential store, then envelope to status mapping.

mod credentials;
mod metadata;
mod query;

pub use credentials::{CredentialUpsert, CredentialsHandler};
pub use metadata::{MetadataHandler, MetadataQuery};
pub use query::QueryHandler;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use querygate_core::GatewayError;
use querygate_types::ResultEnvelope;

/// Render an envelope with the status code its error kind maps to.
pub(crate) fn envelope_response(envelope: ResultEnvelope) -> Response {
    let status =
        StatusCode::from_u16(envelope.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope)).into_response()
}

pub(crate) fn error_response(err: &GatewayError) -> Response {
    envelope_response(ResultEnvelope::error(err.kind(), err.sanitized_message()))
}

/// Envelope for a body or query string the extractor could not decode.
pub(crate) fn malformed_request(what: &str, detail: String) -> Response {
    error_response(&GatewayError::Validation(format!("Malformed {}: {}", what, detail)))
}
