//! Error types for Querygate

use crate::safety::RejectionReason;
use querygate_types::ErrorKind;
use thiserror::Error;

/// Upper bound on backend diagnostics echoed back to callers.
pub const MAX_ADAPTER_MESSAGE_LEN: usize = 512;

/// Main error type for Querygate operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed input or a credential missing required fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Query refused by the safety gate
    #[error("Query rejected: {0}")]
    Rejection(#[from] RejectionReason),

    /// No credential record matched the lookup
    #[error("{0}")]
    NotFound(String),

    /// Backend driver failure, malformed backend response or backend-reported query error
    #[error("{product} fetch failed: {message}")]
    Adapter { product: String, message: String },

    /// A credential exists but no adapter is registered for its product
    #[error("Unsupported productType: {0}")]
    UnsupportedProduct(String),

    /// Configuration file parsing error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// HTTP server error
    #[error("Server error: {0}")]
    Server(String),

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Shorthand for building an adapter failure.
    pub fn adapter(product: impl Into<String>, message: impl ToString) -> Self {
        GatewayError::Adapter {
            product: product.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Validation(_)
            | GatewayError::Json(_)
            | GatewayError::UnsupportedProduct(_) => ErrorKind::Validation,
            GatewayError::Rejection(_) => ErrorKind::Rejection,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Adapter { .. } => ErrorKind::Adapter,
            GatewayError::Config(_)
            | GatewayError::EnvVarNotFound(_)
            | GatewayError::Server(_)
            | GatewayError::Io(_)
            | GatewayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if this error should be logged at error level
    pub fn is_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Adapter | ErrorKind::Internal)
    }

    /// Returns true if this error is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    /// Returns the appropriate HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Message safe to hand back to a caller.
    pub fn sanitized_message(&self) -> String {
        match self {
            GatewayError::Validation(msg) | GatewayError::NotFound(msg) => msg.clone(),
            GatewayError::Json(err) => format!("Malformed JSON: {}", err),
            GatewayError::Adapter { product, message } => {
                format!("{} fetch failed: {}", product, truncate(message, MAX_ADAPTER_MESSAGE_LEN))
            }
            GatewayError::Io(_) | GatewayError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

fn truncate(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

/// Result type alias using GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(GatewayError::NotFound("Invalid productType".into()).status_code(), 400);
        assert_eq!(GatewayError::Validation("missing".into()).status_code(), 400);
        assert_eq!(
            GatewayError::Rejection(RejectionReason::Empty).status_code(),
            400
        );
        assert_eq!(GatewayError::adapter("PostgreSQL", "boom").status_code(), 500);
        assert_eq!(GatewayError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            GatewayError::UnsupportedProduct("foo".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(GatewayError::adapter("Redis", "down").kind(), ErrorKind::Adapter);
        assert!(GatewayError::adapter("Redis", "down").is_error());
        assert!(!GatewayError::NotFound("x".into()).is_error());
    }

    #[test]
    fn test_long_adapter_messages_are_truncated() {
        let long = "x".repeat(MAX_ADAPTER_MESSAGE_LEN + 100);
        let message = GatewayError::adapter("MySQL", &long).sanitized_message();
        assert!(message.starts_with("MySQL fetch failed: "));
        assert!(message.ends_with("..."));
        assert_eq!(
            message.len(),
            "MySQL fetch failed: ".len() + MAX_ADAPTER_MESSAGE_LEN + 3
        );
    }

    #[test]
    fn test_short_adapter_messages_pass_through() {
        let message = GatewayError::adapter("MongoDB", "auth failed").sanitized_message();
        assert_eq!(message, "MongoDB fetch failed: auth failed");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("héllo", 10), "héllo");
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = GatewayError::Internal("stack trace with secrets".into());
        assert_eq!(err.sanitized_message(), "Internal server error");
    }

    #[test]
    fn test_rejection_message_cites_the_rule() {
        let err = GatewayError::from(RejectionReason::ForbiddenKeyword("drop".into()));
        assert_eq!(err.sanitized_message(), "Query rejected: forbidden keyword 'drop'");
    }
}
