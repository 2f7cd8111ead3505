//! Response normalizer
//!
//! Adapters hand back driver results as [`NativeResult`]; [`normalize`] turns
//! them into ordered, JSON-safe [`NormalizedRecord`]s. Conversion is total:
//! every [`NativeValue`] maps to some JSON value.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use querygate_types::NormalizedRecord;
use serde_json::{Map, Number, Value};

/// A driver-level value before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Binary blob, emitted as base64
    Bytes(Vec<u8>),
    /// Object ids, UUIDs and other opaque identifiers
    Id(String),
    /// Arbitrary-precision decimal kept in its textual form
    Decimal(String),
    DateTime(DateTime<FixedOffset>),
    LocalDateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Already JSON; passed through
    Json(Value),
    List(Vec<NativeValue>),
    Map(Vec<(String, NativeValue)>),
    Node {
        element_id: String,
        labels: Vec<String>,
        properties: Vec<(String, NativeValue)>,
    },
    Relationship {
        element_id: String,
        rel_type: String,
        start_element_id: String,
        end_element_id: String,
        properties: Vec<(String, NativeValue)>,
    },
    /// Unrecognised leaf, carried as its textual rendering
    Other(String),
}

impl NativeValue {
    pub fn into_json(self) -> Value {
        match self {
            NativeValue::Null => Value::Null,
            NativeValue::Bool(b) => Value::Bool(b),
            NativeValue::Int(n) => Value::from(n),
            NativeValue::UInt(n) => Value::from(n),
            NativeValue::Float(f) => Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            NativeValue::Text(s)
            | NativeValue::Id(s)
            | NativeValue::Decimal(s)
            | NativeValue::Other(s) => Value::String(s),
            NativeValue::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
            NativeValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
            NativeValue::LocalDateTime(dt) => {
                Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            NativeValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            NativeValue::Time(t) => Value::String(t.format("%H:%M:%S%.f").to_string()),
            NativeValue::Json(v) => v,
            NativeValue::List(items) => {
                Value::Array(items.into_iter().map(NativeValue::into_json).collect())
            }
            NativeValue::Map(entries) => Value::Object(entries_to_map(entries)),
            NativeValue::Node {
                element_id,
                labels,
                properties,
            } => {
                let mut map = Map::new();
                map.insert("element_id".into(), Value::String(element_id));
                map.insert(
                    "labels".into(),
                    Value::Array(labels.into_iter().map(Value::String).collect()),
                );
                map.insert("properties".into(), Value::Object(entries_to_map(properties)));
                Value::Object(map)
            }
            NativeValue::Relationship {
                element_id,
                rel_type,
                start_element_id,
                end_element_id,
                properties,
            } => {
                let mut map = Map::new();
                map.insert("element_id".into(), Value::String(element_id));
                map.insert("type".into(), Value::String(rel_type));
                map.insert("start_element_id".into(), Value::String(start_element_id));
                map.insert("end_element_id".into(), Value::String(end_element_id));
                map.insert("properties".into(), Value::Object(entries_to_map(properties)));
                Value::Object(map)
            }
        }
    }
}

fn entries_to_map(entries: Vec<(String, NativeValue)>) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k, v.into_json()))
        .collect()
}

impl From<Value> for NativeValue {
    fn from(value: Value) -> Self {
        NativeValue::Json(value)
    }
}

/// Result shape produced by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeResult {
    /// Column names plus row tuples (cursor drivers, statement APIs, graph records)
    Tabular {
        columns: Vec<String>,
        rows: Vec<Vec<NativeValue>>,
    },
    /// One value per record (documents, REST items)
    Documents(Vec<NativeValue>),
}

impl NativeResult {
    pub fn empty() -> Self {
        NativeResult::Documents(Vec::new())
    }

    pub fn len(&self) -> usize {
        match self {
            NativeResult::Tabular { rows, .. } => rows.len(),
            NativeResult::Documents(docs) => docs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Convert a native result into normalized records.
///
/// Tabular rows are zipped against the column list; short rows are padded with
/// `null` and surplus cells are named `col_<i>`. Documents that are not
/// objects become a single `value` field.
pub fn normalize(native: NativeResult) -> Vec<NormalizedRecord> {
    match native {
        NativeResult::Tabular { columns, rows } => rows
            .into_iter()
            .map(|row| zip_row(&columns, row))
            .collect(),
        NativeResult::Documents(docs) => docs.into_iter().map(document_record).collect(),
    }
}

fn zip_row(columns: &[String], row: Vec<NativeValue>) -> NormalizedRecord {
    let mut record = NormalizedRecord::new();
    let width = columns.len().max(row.len());
    let mut cells = row.into_iter();
    for i in 0..width {
        let value = cells.next().map(NativeValue::into_json).unwrap_or(Value::Null);
        let name = columns
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("col_{}", i));
        record.insert(name, value);
    }
    record
}

fn document_record(doc: NativeValue) -> NormalizedRecord {
    match doc.into_json() {
        Value::Object(map) => NormalizedRecord::from(map),
        other => {
            let mut record = NormalizedRecord::new();
            record.insert("value", other);
            record
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_tabular_round_trip() {
        let records = normalize(NativeResult::Tabular {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![NativeValue::Int(1), NativeValue::Text("a".into())]],
        });
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].clone().into_value(), json!({"id": 1, "name": "a"}));
    }

    #[test]
    fn test_ragged_rows() {
        let records = normalize(NativeResult::Tabular {
            columns: vec!["a".into(), "b".into()],
            rows: vec![
                vec![NativeValue::Int(1)],
                vec![NativeValue::Int(1), NativeValue::Int(2), NativeValue::Int(3)],
            ],
        });
        assert_eq!(records[0].clone().into_value(), json!({"a": 1, "b": null}));
        assert_eq!(
            records[1].clone().into_value(),
            json!({"a": 1, "b": 2, "col_2": 3})
        );
    }

    #[test]
    fn test_driver_types_become_strings() {
        let ts = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .unwrap();
        let doc = NativeValue::Map(vec![
            ("_id".into(), NativeValue::Id("65f1c0ffee".into())),
            ("created".into(), NativeValue::DateTime(ts)),
            ("blob".into(), NativeValue::Bytes(vec![1, 2, 3])),
            ("price".into(), NativeValue::Decimal("10.50".into())),
            (
                "day".into(),
                NativeValue::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
            ),
        ]);
        let records = normalize(NativeResult::Documents(vec![doc]));
        assert_eq!(
            records[0].clone().into_value(),
            json!({
                "_id": "65f1c0ffee",
                "created": "2024-05-01T12:30:00+00:00",
                "blob": "AQID",
                "price": "10.50",
                "day": "2024-05-01"
            })
        );
    }

    #[test]
    fn test_nested_structures_are_walked() {
        let doc = NativeValue::Map(vec![(
            "items".into(),
            NativeValue::List(vec![
                NativeValue::Map(vec![("id".into(), NativeValue::Id("x".into()))]),
                NativeValue::Float(f64::NAN),
                NativeValue::Other("Symbol(foo)".into()),
            ]),
        )]);
        let records = normalize(NativeResult::Documents(vec![doc]));
        assert_eq!(
            records[0].clone().into_value(),
            json!({"items": [{"id": "x"}, "NaN", "Symbol(foo)"]})
        );
    }

    #[test]
    fn test_graph_values_flatten_to_maps() {
        let node = NativeValue::Node {
            element_id: "4:abc:1".into(),
            labels: vec!["DevOps".into()],
            properties: vec![("name".into(), NativeValue::Text("ci".into()))],
        };
        let rel = NativeValue::Relationship {
            element_id: "5:abc:9".into(),
            rel_type: "DEPENDS_ON".into(),
            start_element_id: "4:abc:1".into(),
            end_element_id: "4:abc:2".into(),
            properties: vec![],
        };
        let records = normalize(NativeResult::Tabular {
            columns: vec!["n".into(), "r".into()],
            rows: vec![vec![node, rel]],
        });
        let value = records[0].clone().into_value();
        assert_eq!(value["n"]["labels"], json!(["DevOps"]));
        assert_eq!(value["n"]["properties"]["name"], "ci");
        assert_eq!(value["r"]["type"], "DEPENDS_ON");
        assert_eq!(value["r"]["end_element_id"], "4:abc:2");
    }

    #[test]
    fn test_scalar_documents_are_wrapped() {
        let records = normalize(NativeResult::Documents(vec![NativeValue::Text("v".into())]));
        assert_eq!(records[0].clone().into_value(), json!({"value": "v"}));
    }

    #[test]
    fn test_local_datetime_is_iso() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            NativeValue::LocalDateTime(dt).into_json(),
            json!("2024-01-02T03:04:05")
        );
    }
}
