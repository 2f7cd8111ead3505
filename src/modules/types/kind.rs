//! Query kinds and product families

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The shape of query a product accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryKind {
    /// SQL `SELECT` text
    Sql,
    /// Restricted SQL-like expression evaluated by a spreadsheet backend
    Formula,
    /// JSON filter object (document stores) or DSL object (search engines)
    DocumentFilter,
    /// Cypher text
    GraphCypher,
    /// Command text (key-value commands, Flux, PromQL, LogQL)
    Command,
    /// Request parameter mapping for REST backends
    RestParams,
}

impl QueryKind {
    pub fn all() -> &'static [QueryKind] {
        &[
            QueryKind::Sql,
            QueryKind::Formula,
            QueryKind::DocumentFilter,
            QueryKind::GraphCypher,
            QueryKind::Command,
            QueryKind::RestParams,
        ]
    }

    /// Returns true if queries of this kind pass through the safety gate.
    pub fn is_gated(&self) -> bool {
        !matches!(self, QueryKind::RestParams)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Sql => "SQL",
            QueryKind::Formula => "FORMULA",
            QueryKind::DocumentFilter => "DOCUMENT_FILTER",
            QueryKind::GraphCypher => "GRAPH_CYPHER",
            QueryKind::Command => "COMMAND",
            QueryKind::RestParams => "REST_PARAMS",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace(['-', ' '], "_").as_str() {
            "SQL" => Ok(QueryKind::Sql),
            "FORMULA" => Ok(QueryKind::Formula),
            "DOCUMENT_FILTER" | "DSL" => Ok(QueryKind::DocumentFilter),
            "GRAPH_CYPHER" | "CYPHER" => Ok(QueryKind::GraphCypher),
            "COMMAND" => Ok(QueryKind::Command),
            "REST_PARAMS" | "REST" => Ok(QueryKind::RestParams),
            _ => Err(format!("Unknown query kind: {}", s)),
        }
    }
}

/// Backend family; one adapter implementation strategy per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductFamily {
    Sql,
    Document,
    Graph,
    KeyValue,
    Search,
    TimeSeries,
    Spreadsheet,
    PaginatedRest,
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProductFamily::Sql => "sql",
            ProductFamily::Document => "document",
            ProductFamily::Graph => "graph",
            ProductFamily::KeyValue => "key_value",
            ProductFamily::Search => "search",
            ProductFamily::TimeSeries => "time_series",
            ProductFamily::Spreadsheet => "spreadsheet",
            ProductFamily::PaginatedRest => "paginated_rest",
        };
        f.write_str(name)
    }
}
