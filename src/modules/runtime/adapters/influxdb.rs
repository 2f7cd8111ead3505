//! InfluxDB 2.x adapter (Flux over `/api/v2/query`, annotated CSV results)

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::DateTime;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::{Product, QueryKind};
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::http::{base_url, send_text};
use super::Adapter;

pub struct InfluxdbAdapter {
    client: Client,
}

impl InfluxdbAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Split CSV text into rows, honouring quoted fields with `""` escapes and
/// embedded line breaks. Blank lines come back as empty rows.
fn csv_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => quoted = false,
                other => field.push(other),
            }
            continue;
        }
        match c {
            '"' => quoted = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                if !row.is_empty() || !field.is_empty() {
                    row.push(std::mem::take(&mut field));
                }
                rows.push(std::mem::take(&mut row));
            }
            other => field.push(other),
        }
    }
    if !row.is_empty() || !field.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

fn typed_cell(datatype: &str, raw: &str) -> NativeValue {
    let converted = match datatype {
        "long" => raw.parse().ok().map(NativeValue::Int),
        "unsignedLong" => raw.parse().ok().map(NativeValue::UInt),
        "double" => raw.parse().ok().map(NativeValue::Float),
        "boolean" => raw.parse().ok().map(NativeValue::Bool),
        "base64Binary" => BASE64.decode(raw).ok().map(NativeValue::Bytes),
        t if t.starts_with("dateTime") => DateTime::parse_from_rfc3339(raw).ok().map(NativeValue::DateTime),
        _ => None,
    };
    converted.unwrap_or_else(|| NativeValue::Text(raw.to_string()))
}

/// One table section of an annotated CSV response.
#[derive(Default)]
struct Section {
    datatypes: Vec<String>,
    defaults: Vec<String>,
    header: Option<Vec<String>>,
}

/// Convert an annotated CSV body into one record per data row.
///
/// The leading annotation column is dropped; empty cells take the `#default`
/// annotation when one is given and are null otherwise.
fn parse_annotated_csv(body: &str) -> Result<Vec<NativeValue>> {
    let mut records = Vec::new();
    let mut section = Section::default();

    for row in csv_rows(body) {
        if row.is_empty() {
            section = Section::default();
            continue;
        }
        match row[0].as_str() {
            "#datatype" => {
                if section.header.is_some() {
                    section = Section::default();
                }
                section.datatypes = row;
                continue;
            }
            "#default" => {
                section.defaults = row;
                continue;
            }
            annotation if annotation.starts_with('#') => continue,
            _ => {}
        }

        let Some(header) = &section.header else {
            section.header = Some(row);
            continue;
        };

        if header.iter().skip(1).map(String::as_str).eq(["error", "reference"]) {
            let message = row.get(1).cloned().unwrap_or_default();
            return Err(GatewayError::adapter(Product::Influxdb.as_str(), message));
        }

        let fields = header
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, name)| {
                let raw = row.get(i).map(String::as_str).unwrap_or_default();
                let raw = if raw.is_empty() {
                    section.defaults.get(i).map(String::as_str).unwrap_or_default()
                } else {
                    raw
                };
                let value = if raw.is_empty() {
                    NativeValue::Null
                } else {
                    let datatype = section.datatypes.get(i).map(String::as_str).unwrap_or("string");
                    typed_cell(datatype, raw)
                };
                (name.clone(), value)
            })
            .collect();
        records.push(NativeValue::Map(fields));
    }
    Ok(records)
}

#[async_trait]
impl Adapter for InfluxdbAdapter {
    fn product(&self) -> Product {
        Product::Influxdb
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let flux = query.query_text(QueryKind::Command)?;
        let org = params.require("org")?;
        debug!(org = %org, "Running Flux query");

        let request = self
            .client
            .post(format!("{}/api/v2/query", base_url(&params.require("url")?)))
            .query(&[("org", org.as_str())])
            .header("Authorization", format!("Token {}", params.require("token")?))
            .header("Accept", "application/csv")
            .json(&json!({
                "query": flux,
                "type": "flux",
                "dialect": {
                    "header": true,
                    "delimiter": ",",
                    "annotations": ["datatype", "group", "default"],
                    "commentPrefix": "#",
                    "dateTimeFormat": "RFC3339"
                }
            }));
        let (_, body) = send_text(Product::Influxdb, request).await?;
        Ok(NativeResult::Documents(parse_annotated_csv(&body)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CPU_CSV: &str = "#datatype,string,long,dateTime:RFC3339,double,string,string\r\n\
#group,false,false,false,false,true,true\r\n\
#default,_result,,,,,\r\n\
,result,table,_time,_value,_field,host\r\n\
,,0,2024-01-01T00:00:00Z,1.5,usage,\"h1,rack2\"\r\n\
,,0,2024-01-01T00:01:00Z,,usage,h1\r\n\
\r\n\
#datatype,string,long,string,boolean\r\n\
#group,false,false,true,false\r\n\
#default,_result,,,\r\n\
,result,table,_field,_value\r\n\
,,1,up,true\r\n";

    #[test]
    fn test_csv_rows_handle_quotes() {
        let rows = csv_rows("a,\"b,\"\"c\"\"\",d\n\nx\n");
        assert_eq!(rows, vec![vec!["a", "b,\"c\"", "d"], vec![], vec!["x"]]);
    }

    #[test]
    fn test_parse_annotated_sections() {
        let records = parse_annotated_csv(CPU_CSV).unwrap();
        assert_eq!(records.len(), 3);

        let NativeValue::Map(first) = &records[0] else {
            panic!("expected a map")
        };
        assert_eq!(first[0], ("result".to_string(), NativeValue::Text("_result".into())));
        assert_eq!(first[1], ("table".to_string(), NativeValue::Int(0)));
        assert!(matches!(first[2].1, NativeValue::DateTime(_)));
        assert_eq!(first[3].1, NativeValue::Float(1.5));
        assert_eq!(first[5].1, NativeValue::Text("h1,rack2".into()));

        let NativeValue::Map(second) = &records[1] else {
            panic!("expected a map")
        };
        assert_eq!(second[3].1, NativeValue::Null);

        let NativeValue::Map(third) = &records[2] else {
            panic!("expected a map")
        };
        assert_eq!(third[3], ("_value".to_string(), NativeValue::Bool(true)));
    }

    #[test]
    fn test_inline_error_table() {
        let body = "#datatype,string,string\n#group,true,true\n#default,,\n,error,reference\n,bucket not found,897\n";
        let err = parse_annotated_csv(body).unwrap_err();
        assert!(err.to_string().contains("bucket not found"));
    }

    #[tokio::test]
    async fn test_flux_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/query"))
            .and(query_param("org", "acme"))
            .and(header("authorization", "Token t0k"))
            .and(body_partial_json(json!({"type": "flux"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(CPU_CSV))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = InfluxdbAdapter::new(http::client().unwrap());
        let creds = ConnectionParams::new()
            .with("url", server.uri())
            .with("token", "t0k")
            .with("org", "acme")
            .with("bucket", "metrics");
        let query = LogicalQuery::new("influxdb", r#"from(bucket:"metrics") |> range(start:-1h)"#);
        let records = adapter.execute(&creds, &query).await.unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("_time"), Some(&json!("2024-01-01T00:00:00+00:00")));
        assert_eq!(records[1].get("_value"), Some(&serde_json::Value::Null));
    }
}
