//! Redis adapter for the read-only command subset

use async_trait::async_trait;
use querygate_core::safety::REDIS_ALLOWED_COMMANDS;
use querygate_core::{ConnectionParams, GatewayError, LogicalQuery, NativeResult, NativeValue, Result};
use querygate_types::{Product, QueryKind};
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisResult};
use reqwest::Url;
use std::collections::BTreeMap;
use tracing::debug;

use super::Adapter;

const DEFAULT_PORT: u16 = 6379;

pub struct RedisAdapter;

impl RedisAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RedisAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn redis_error(e: impl ToString) -> GatewayError {
    GatewayError::adapter(Product::Redis.as_str(), e)
}

/// Split `LRANGE logs, 0, 10` into the upper-cased command and its
/// comma-separated, trimmed arguments.
fn parse_command(text: &str) -> Result<(String, Vec<String>)> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(text.len());
    let (command, rest) = text.split_at(split);
    if command.is_empty() {
        return Err(GatewayError::Validation("Empty Redis command".to_string()));
    }
    let command = command.to_uppercase();
    if !REDIS_ALLOWED_COMMANDS.contains(&command.to_lowercase().as_str()) {
        return Err(GatewayError::Validation(format!(
            "Unsupported Redis command: {}",
            command
        )));
    }
    let args = rest
        .trim_start_matches(|c: char| c.is_whitespace() || c == ',')
        .split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(str::to_string)
        .collect();
    Ok((command, args))
}

fn connection_url(params: &ConnectionParams) -> Result<Url> {
    let host = params.require("host")?;
    let port = params.port(DEFAULT_PORT)?;
    let mut url = Url::parse(&format!("redis://{}:{}", host, port))
        .map_err(|e| GatewayError::Validation(format!("invalid redis host '{}': {}", host, e)))?;
    // Credentials go through the URL setters so reserved characters get percent-encoded
    if let Some(username) = params.get("username") {
        url.set_username(&username)
            .map_err(|_| GatewayError::Validation("invalid redis username".to_string()))?;
    }
    if let Some(password) = params.get("password") {
        url.set_password(Some(&password))
            .map_err(|_| GatewayError::Validation("invalid redis password".to_string()))?;
    }
    if let Some(db) = params.get_int("db")? {
        url.set_path(&db.to_string());
    }
    Ok(url)
}

fn text_or_null(value: Option<String>) -> NativeValue {
    value.map(NativeValue::Text).unwrap_or(NativeValue::Null)
}

fn record(fields: Vec<(&str, NativeValue)>) -> NativeValue {
    NativeValue::Map(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn require_args(command: &str, args: &[String], count: usize, usage: &str) -> Result<()> {
    if args.len() < count {
        Err(GatewayError::Validation(format!("{} requires {}", command, usage)))
    } else {
        Ok(())
    }
}

async fn run_command(
    conn: &mut MultiplexedConnection,
    command: &str,
    args: &[String],
) -> Result<Vec<NativeValue>> {
    match command {
        "GET" => {
            require_args(command, args, 1, "a key")?;
            let result: RedisResult<Option<String>> =
                redis::cmd("GET").arg(&args[0]).query_async(conn).await;
            let value = result.map_err(redis_error)?;
            Ok(vec![record(vec![("result", text_or_null(value))])])
        }
        "HGET" => {
            require_args(command, args, 2, "key and field")?;
            let result: RedisResult<Option<String>> = redis::cmd("HGET")
                .arg(&args[0])
                .arg(&args[1])
                .query_async(conn)
                .await;
            let value = result.map_err(redis_error)?;
            Ok(vec![record(vec![("result", text_or_null(value))])])
        }
        "MGET" => {
            require_args(command, args, 1, "at least one key")?;
            let result: RedisResult<Vec<Option<String>>> =
                redis::cmd("MGET").arg(args).query_async(conn).await;
            let values = result.map_err(redis_error)?;
            Ok(args
                .iter()
                .zip(values)
                .map(|(key, value)| {
                    record(vec![
                        ("key", NativeValue::Text(key.clone())),
                        ("value", text_or_null(value)),
                    ])
                })
                .collect())
        }
        "HGETALL" => {
            require_args(command, args, 1, "a key")?;
            let result: RedisResult<BTreeMap<String, String>> =
                redis::cmd("HGETALL").arg(&args[0]).query_async(conn).await;
            let hash = result.map_err(redis_error)?;
            if hash.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![NativeValue::Map(
                hash.into_iter()
                    .map(|(field, value)| (field, NativeValue::Text(value)))
                    .collect(),
            )])
        }
        "LRANGE" => {
            require_args(command, args, 3, "key, start, and stop")?;
            let bound = |raw: &str| {
                raw.parse::<isize>().map_err(|_| {
                    GatewayError::Validation(format!("LRANGE bound '{}' is not an integer", raw))
                })
            };
            let start = bound(&args[1])?;
            let stop = bound(&args[2])?;
            let result: RedisResult<Vec<String>> = redis::cmd("LRANGE")
                .arg(&args[0])
                .arg(start)
                .arg(stop)
                .query_async(conn)
                .await;
            let items = result.map_err(redis_error)?;
            let offset = if start < 0 { 0 } else { start as i64 };
            Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    record(vec![
                        ("index", NativeValue::Int(offset + i as i64)),
                        ("value", NativeValue::Text(value)),
                    ])
                })
                .collect())
        }
        "SCAN" => {
            let cursor = args.first().map(String::as_str).unwrap_or("0");
            let mut cmd = redis::cmd("SCAN");
            cmd.arg(cursor);
            for arg in args.iter().skip(1) {
                cmd.arg(arg.split_whitespace().collect::<Vec<_>>());
            }
            let result: RedisResult<(u64, Vec<String>)> = cmd.query_async(conn).await;
            let (next, keys) = result.map_err(redis_error)?;
            Ok(vec![record(vec![
                ("cursor", NativeValue::UInt(next)),
                (
                    "keys",
                    NativeValue::List(keys.into_iter().map(NativeValue::Text).collect()),
                ),
            ])])
        }
        other => Err(GatewayError::Validation(format!(
            "Unsupported Redis command: {}",
            other
        ))),
    }
}

#[async_trait]
impl Adapter for RedisAdapter {
    fn product(&self) -> Product {
        Product::Redis
    }

    async fn fetch(&self, params: &ConnectionParams, query: &LogicalQuery) -> Result<NativeResult> {
        let (command, args) = parse_command(&query.query_text(QueryKind::Command)?)?;
        let url = connection_url(params)?;
        debug!(command = %command, "Running Redis command");

        let client = Client::open(url.as_str()).map_err(redis_error)?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_error)?;
        // The connection closes when `conn` drops at the end of this call
        let records = run_command(&mut conn, &command, &args).await?;
        Ok(NativeResult::Documents(records))
    }
}
