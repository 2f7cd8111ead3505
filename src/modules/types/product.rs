//! Product catalogue

use crate::category::Category;
use crate::kind::{ProductFamily, QueryKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every backend the gateway can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    Postgresql,
    Supabase,
    Timescaledb,
    Mysql,
    Snowflake,
    Databricks,
    Clickhouse,
    Mongodb,
    Neo4j,
    Redis,
    Elasticsearch,
    Opensearch,
    Influxdb,
    Prometheus,
    Loki,
    Tempo,
    Googlesheet,
    Airtable,
    Zoho,
    Freshworks,
    Servicenow,
    Odoo,
    Sap,
    Hubspot,
    Shopify,
    Woocommerce,
    Wix,
}

impl Product {
    pub fn all() -> &'static [Product] {
        &[
            Product::Postgresql,
            Product::Supabase,
            Product::Timescaledb,
            Product::Mysql,
            Product::Snowflake,
            Product::Databricks,
            Product::Clickhouse,
            Product::Mongodb,
            Product::Neo4j,
            Product::Redis,
            Product::Elasticsearch,
            Product::Opensearch,
            Product::Influxdb,
            Product::Prometheus,
            Product::Loki,
            Product::Tempo,
            Product::Googlesheet,
            Product::Airtable,
            Product::Zoho,
            Product::Freshworks,
            Product::Servicenow,
            Product::Odoo,
            Product::Sap,
            Product::Hubspot,
            Product::Shopify,
            Product::Woocommerce,
            Product::Wix,
        ]
    }

    /// Canonical lower-case product name as used in routes and credential keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Postgresql => "postgresql",
            Product::Supabase => "supabase",
            Product::Timescaledb => "timescaledb",
            Product::Mysql => "mysql",
            Product::Snowflake => "snowflake",
            Product::Databricks => "databricks",
            Product::Clickhouse => "clickhouse",
            Product::Mongodb => "mongodb",
            Product::Neo4j => "neo4j",
            Product::Redis => "redis",
            Product::Elasticsearch => "elasticsearch",
            Product::Opensearch => "opensearch",
            Product::Influxdb => "influxdb",
            Product::Prometheus => "prometheus",
            Product::Loki => "loki",
            Product::Tempo => "tempo",
            Product::Googlesheet => "googlesheet",
            Product::Airtable => "airtable",
            Product::Zoho => "zoho",
            Product::Freshworks => "freshworks",
            Product::Servicenow => "servicenow",
            Product::Odoo => "odoo",
            Product::Sap => "sap",
            Product::Hubspot => "hubspot",
            Product::Shopify => "shopify",
            Product::Woocommerce => "woocommerce",
            Product::Wix => "wix",
        }
    }

    pub fn family(&self) -> ProductFamily {
        match self {
            Product::Postgresql
            | Product::Supabase
            | Product::Timescaledb
            | Product::Mysql
            | Product::Snowflake
            | Product::Databricks
            | Product::Clickhouse => ProductFamily::Sql,
            Product::Mongodb => ProductFamily::Document,
            Product::Neo4j => ProductFamily::Graph,
            Product::Redis => ProductFamily::KeyValue,
            Product::Elasticsearch | Product::Opensearch => ProductFamily::Search,
            Product::Influxdb | Product::Prometheus | Product::Loki | Product::Tempo => {
                ProductFamily::TimeSeries
            }
            Product::Googlesheet => ProductFamily::Spreadsheet,
            Product::Airtable
            | Product::Zoho
            | Product::Freshworks
            | Product::Servicenow
            | Product::Odoo
            | Product::Sap
            | Product::Hubspot
            | Product::Shopify
            | Product::Woocommerce
            | Product::Wix => ProductFamily::PaginatedRest,
        }
    }

    pub fn query_kind(&self) -> QueryKind {
        match self.family() {
            ProductFamily::Sql => QueryKind::Sql,
            ProductFamily::Document | ProductFamily::Search => QueryKind::DocumentFilter,
            ProductFamily::Graph => QueryKind::GraphCypher,
            ProductFamily::KeyValue => QueryKind::Command,
            ProductFamily::TimeSeries => match self {
                Product::Tempo => QueryKind::RestParams,
                _ => QueryKind::Command,
            },
            ProductFamily::Spreadsheet => QueryKind::Formula,
            ProductFamily::PaginatedRest => QueryKind::RestParams,
        }
    }

    /// Connection parameters that must be present for a credential to be stored.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Product::Postgresql | Product::Mysql => &["host", "port", "user", "password", "database"],
            Product::Supabase => &["uri", "schema", "table"],
            Product::Timescaledb => &["host", "port", "user", "password", "database", "sslmode"],
            Product::Snowflake => &["user", "password", "account", "warehouse", "database", "schema", "table"],
            Product::Databricks => &["server_hostname", "token", "warehouse_id"],
            Product::Clickhouse => &["base_url", "user", "password", "database"],
            Product::Mongodb => &["uri", "database", "collection"],
            Product::Neo4j => &["uri", "username", "password", "database"],
            Product::Redis => &["host", "port", "username", "password"],
            Product::Elasticsearch => &["cloud_id", "username", "password"],
            Product::Opensearch => &["host", "username", "password"],
            Product::Influxdb => &["url", "token", "org", "bucket"],
            Product::Prometheus | Product::Loki | Product::Tempo => &["base_url", "username", "api_token"],
            Product::Googlesheet => &["sheet_id"],
            Product::Airtable => &["base_id", "api_key"],
            Product::Zoho => &["client_id", "client_secret", "refresh_token"],
            Product::Freshworks => &["api_key", "domain"],
            Product::Servicenow => &["instance", "username", "password"],
            Product::Odoo => &["url", "db", "uid", "key"],
            Product::Sap => &["api_key"],
            Product::Hubspot => &["access_token"],
            Product::Shopify => &["store_url", "access_token"],
            Product::Woocommerce => &["url", "consumer_key", "consumer_secret"],
            Product::Wix => &["api_key", "account_id", "site_id"],
        }
    }

    pub fn example_query(&self) -> &'static str {
        match self {
            Product::Postgresql => "SELECT id, name FROM customers LIMIT 10",
            Product::Supabase => "SELECT id, name FROM public.customers LIMIT 10",
            Product::Timescaledb => {
                "SELECT time_bucket('5 minutes', ts) AS bucket, avg(value) FROM metrics GROUP BY bucket ORDER BY bucket DESC LIMIT 12"
            }
            Product::Mysql => "SELECT * FROM orders LIMIT 10",
            Product::Snowflake => "SELECT * FROM products LIMIT 10",
            Product::Databricks => "SELECT * FROM sales LIMIT 10",
            Product::Clickhouse => "SELECT * FROM system.tables LIMIT 10",
            Product::Mongodb => r#"{"age": {"$gt": 30}}"#,
            Product::Neo4j => "MATCH (n:DevOps) RETURN n LIMIT 10",
            Product::Redis => "LRANGE logs, 0, 10",
            Product::Elasticsearch | Product::Opensearch => {
                r#"{"query": {"match": {"message": "error"}}, "size": 10}"#
            }
            Product::Influxdb => {
                r#"from(bucket:"my-bucket") |> range(start:-1h) |> filter(fn:(r) => r._measurement == "cpu")"#
            }
            Product::Prometheus => "rate(http_requests_total[5m])",
            Product::Loki => r#"{app="api"} |= "error""#,
            Product::Tempo => r#"{"tags": "service.name=checkout", "limit": 20}"#,
            Product::Googlesheet => "select A, B, C where A > 10",
            Product::Airtable => "FIND('Laptop', {ProductName})",
            Product::Zoho => r#"{"endpoint": "Contacts", "per_page": 200}"#,
            Product::Freshworks => r#"{"endpoint": "contacts"}"#,
            Product::Servicenow => r#"{"endpoint": "table/incident", "sysparm_query": "active=true"}"#,
            Product::Odoo => r#"{"model": "res.partner", "fields": ["name", "email"]}"#,
            Product::Sap => r#"{"service": "API_SALES_ORDER_SRV", "entity": "A_SalesOrder", "$top": 10}"#,
            Product::Hubspot => r#"{"endpoint": "contacts", "properties": "email,firstname"}"#,
            Product::Shopify => r#"{"endpoint": "admin/api/2025-01/orders.json", "status": "any"}"#,
            Product::Woocommerce => r#"{"endpoint": "orders", "status": "processing"}"#,
            Product::Wix => r#"{"endpoint": "stores/v1/products/query"}"#,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Product::Postgresql => "PostgreSQL database",
            Product::Supabase => "Supabase hosted Postgres (TLS required)",
            Product::Timescaledb => "TimescaleDB time-series on PostgreSQL",
            Product::Mysql => "MySQL database",
            Product::Snowflake => "Snowflake warehouse via the SQL API",
            Product::Databricks => "Databricks SQL statement execution API",
            Product::Clickhouse => "ClickHouse over HTTP with FORMAT JSON",
            Product::Mongodb => "MongoDB find() with a JSON filter",
            Product::Neo4j => "Neo4j Cypher over the HTTP query API",
            Product::Redis => "Redis read-only commands",
            Product::Elasticsearch => "Elasticsearch search DSL",
            Product::Opensearch => "OpenSearch search DSL",
            Product::Influxdb => "InfluxDB 2.x Flux queries",
            Product::Prometheus => "Prometheus instant PromQL queries",
            Product::Loki => "Grafana Loki LogQL range queries",
            Product::Tempo => "Grafana Tempo trace search",
            Product::Googlesheet => "Google Sheets visualization query language",
            Product::Airtable => "Airtable records with filterByFormula",
            Product::Zoho => "Zoho CRM REST API",
            Product::Freshworks => "Freshworks REST API",
            Product::Servicenow => "ServiceNow REST API",
            Product::Odoo => "Odoo JSON-RPC",
            Product::Sap => "SAP S/4HANA OData API",
            Product::Hubspot => "HubSpot CRM objects API",
            Product::Shopify => "Shopify Admin REST API",
            Product::Woocommerce => "WooCommerce REST API",
            Product::Wix => "Wix REST API",
        }
    }

    /// Categories this product is offered under.
    pub fn categories(&self) -> &'static [Category] {
        match self {
            Product::Postgresql
            | Product::Supabase
            | Product::Mysql
            | Product::Snowflake
            | Product::Databricks
            | Product::Mongodb
            | Product::Neo4j
            | Product::Airtable => &[Category::Db],
            Product::Googlesheet => &[Category::Ss],
            Product::Freshworks
            | Product::Servicenow
            | Product::Odoo
            | Product::Sap
            | Product::Hubspot => &[Category::App],
            Product::Zoho => &[Category::App, Category::Ecom],
            Product::Shopify | Product::Woocommerce | Product::Wix => &[Category::Ecom],
            Product::Timescaledb
            | Product::Clickhouse
            | Product::Redis
            | Product::Elasticsearch
            | Product::Opensearch
            | Product::Influxdb
            | Product::Prometheus
            | Product::Loki
            | Product::Tempo => &[Category::Doi],
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Product {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        let alias = match wanted.as_str() {
            "postgres" => "postgresql",
            "mongo" => "mongodb",
            "googlesheets" | "google_sheets" => "googlesheet",
            other => other,
        };
        Product::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == alias)
            .ok_or_else(|| format!("Unknown product: {}", s))
    }
}
