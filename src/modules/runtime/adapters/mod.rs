//! Backend adapters, one per product

mod clickhouse;
mod databricks;
pub mod http;
mod influxdb;
mod mongodb;
mod mysql;
mod neo4j;
mod postgres;
mod redis;
mod registry;
pub mod rest;
mod search;
mod sheets;
mod snowflake;
mod timeseries;
mod traits;

pub use clickhouse::ClickhouseAdapter;
pub use databricks::DatabricksAdapter;
pub use influxdb::InfluxdbAdapter;
pub use mongodb::MongodbAdapter;
pub use mysql::MysqlAdapter;
pub use neo4j::Neo4jAdapter;
pub use postgres::PostgresAdapter;
pub use redis::RedisAdapter;
pub use registry::AdapterRegistry;
pub use search::SearchAdapter;
pub use sheets::SheetsAdapter;
pub use snowflake::SnowflakeAdapter;
pub use timeseries::{LokiAdapter, PrometheusAdapter, TempoAdapter};
pub use traits::Adapter;

use querygate_core::sql::build_statement;
use querygate_core::{LogicalQuery, Result};
use querygate_types::QueryKind;

/// Statement for a SQL-kind query with `FROM table_ref` injected when missing
/// and the row cap applied.
pub(crate) fn sql_statement(query: &LogicalQuery, table_ref: Option<&str>) -> Result<String> {
    let text = query.query_text(QueryKind::Sql)?;
    build_statement(&text, table_ref, query.hints.limit)
}
