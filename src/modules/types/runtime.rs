//! Runtime type definitions for request/response handling

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Query dispatch request body (`POST /query/{category}/{product}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Query text, or a mapping for DSL / REST parameter kinds
    #[serde(default)]
    pub query: Option<Value>,
    /// Credential owner
    #[serde(default, alias = "owner_id")]
    pub userid: Option<String>,
    /// Connection identifier
    #[serde(default, alias = "connection_id")]
    pub connection: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// One result row: field names in backend order mapped to JSON-safe values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedRecord(pub Map<String, Value>);

impl NormalizedRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for NormalizedRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for NormalizedRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Classification of a failed request, used by the route layer to pick a
/// transport status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input or missing credential fields
    Validation,
    /// Query refused by the safety gate
    Rejection,
    /// No credential record matched
    NotFound,
    /// Backend driver or response failure
    Adapter,
    /// Anything unclassified
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::Rejection | ErrorKind::NotFound => 400,
            ErrorKind::Adapter | ErrorKind::Internal => 500,
        }
    }
}

/// Uniform response for every dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<NormalizedRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    error_kind: Option<ErrorKind>,
}

impl ResultEnvelope {
    pub fn success(data: Vec<NormalizedRecord>) -> Self {
        Self {
            status: Status::Success,
            data: Some(data),
            message: None,
            error_kind: None,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            data: None,
            message: Some(message.into()),
            error_kind: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    /// Transport status code for this envelope (200 on success).
    pub fn status_code(&self) -> u16 {
        match self.error_kind {
            Some(kind) => kind.status_code(),
            None if self.is_success() => 200,
            None => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_omits_message() {
        let record: NormalizedRecord = vec![
            ("id".to_string(), json!(1)),
            ("name".to_string(), json!("a")),
        ]
        .into_iter()
        .collect();

        let envelope = ResultEnvelope::success(vec![record]);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            json!({"status": "success", "data": [{"id": 1, "name": "a"}]})
        );
        assert_eq!(envelope.status_code(), 200);
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let envelope = ResultEnvelope::error(ErrorKind::NotFound, "Invalid productType");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json, json!({"status": "error", "message": "Invalid productType"}));
        assert_eq!(envelope.status_code(), 400);
        assert_eq!(envelope.error_kind(), Some(ErrorKind::NotFound));
    }

    #[test]
    fn test_record_preserves_field_order() {
        let record: NormalizedRecord = vec![
            ("zeta".to_string(), json!(1)),
            ("alpha".to_string(), json!(2)),
        ]
        .into_iter()
        .collect();
        let fields: Vec<_> = record.fields().cloned().collect();
        assert_eq!(fields, vec!["zeta", "alpha"]);
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"zeta":1,"alpha":2}"#);
    }

    #[test]
    fn test_query_request_accepts_aliases() {
        let request: QueryRequest = serde_json::from_value(json!({
            "query": {"match_all": {}},
            "owner_id": "user_001",
            "limit": 5
        }))
        .unwrap();
        assert_eq!(request.userid.as_deref(), Some("user_001"));
        assert_eq!(request.limit, Some(5));
        assert!(request.query.unwrap().is_object());
    }

    #[test]
    fn test_adapter_errors_map_to_500() {
        assert_eq!(ErrorKind::Adapter.status_code(), 500);
        assert_eq!(ErrorKind::Rejection.status_code(), 400);
    }
}
