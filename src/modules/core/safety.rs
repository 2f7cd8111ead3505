//! Query safety gate
//!
//! A pure, stateless check run on every textual query before it reaches a
//! live backend. Policies are selected by query kind and, for command-style
//! kinds, by engine name.

use querygate_types::QueryKind;
use serde_json::Value;
use thiserror::Error;

use crate::sql::Skeleton;

const SQL_FORBIDDEN: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "truncate", "create", "grant", "revoke",
];
const CYPHER_FORBIDDEN: &[&str] = &["create", "delete", "merge", "set", "drop"];
const FORMULA_FORBIDDEN: &[&str] = &["update", "delete", "insert", "drop", "alter"];
const SEARCH_FORBIDDEN: &[&str] = &["delete", "update", "reindex"];
const FLUX_FORBIDDEN_CALLS: &[&str] = &["to", "delete"];

/// Read-only Redis commands.
pub const REDIS_ALLOWED_COMMANDS: &[&str] = &["get", "mget", "hget", "hgetall", "lrange", "scan"];

/// Why a query was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    #[error("query is empty")]
    Empty,

    #[error("forbidden keyword '{0}'")]
    ForbiddenKeyword(String),

    #[error("query must start with {}", .0.join(" or "))]
    InvalidPrefix(&'static [&'static str]),

    #[error("query has no FROM clause and no table was provided")]
    MissingFrom,

    #[error("command '{0}' is not in the read-only allowlist")]
    CommandNotAllowed(String),

    #[error("forbidden call '{0}()'")]
    ForbiddenCall(String),

    #[error("query must be a JSON object")]
    NotAMapping,
}

/// A query that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    pub text: String,
    pub kind: QueryKind,
    /// SQL without a `FROM` clause that the adapter must complete from the table hint
    pub needs_from: bool,
}

/// Static pre-execution validator
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGate;

impl SafetyGate {
    pub fn new() -> Self {
        Self
    }

    /// Validate `query_text` for `engine` under the rules of `kind`.
    pub fn validate(
        &self,
        query_text: &str,
        engine: &str,
        kind: QueryKind,
        table_hint: Option<&str>,
    ) -> Result<ValidatedQuery, RejectionReason> {
        let text = query_text.trim();
        let has_hint = table_hint.map(|t| !t.trim().is_empty()).unwrap_or(false);
        let mut needs_from = false;

        match kind {
            QueryKind::Sql => {
                let skeleton = non_empty(text)?;
                reject_keywords(&skeleton, SQL_FORBIDDEN)?;
                require_prefix(&skeleton, &["select"])?;
                if !skeleton.contains_word("from") {
                    if !has_hint {
                        return Err(RejectionReason::MissingFrom);
                    }
                    needs_from = true;
                }
            }
            QueryKind::GraphCypher => {
                let skeleton = non_empty(text)?;
                reject_keywords(&skeleton, CYPHER_FORBIDDEN)?;
                require_prefix(&skeleton, &["match", "call"])?;
            }
            QueryKind::Formula => {
                let skeleton = non_empty(text)?;
                reject_keywords(&skeleton, FORMULA_FORBIDDEN)?;
                require_prefix(&skeleton, &["select"])?;
            }
            QueryKind::Command => validate_command(text, engine)?,
            QueryKind::DocumentFilter => validate_document(text, engine)?,
            QueryKind::RestParams => {}
        }

        Ok(ValidatedQuery {
            text: text.to_string(),
            kind,
            needs_from,
        })
    }
}

fn non_empty(text: &str) -> Result<Skeleton<'_>, RejectionReason> {
    if text.is_empty() {
        Err(RejectionReason::Empty)
    } else {
        Ok(Skeleton::parse(text))
    }
}

fn reject_keywords(skeleton: &Skeleton<'_>, forbidden: &[&str]) -> Result<(), RejectionReason> {
    match skeleton.find_any(forbidden) {
        Some(word) => Err(RejectionReason::ForbiddenKeyword(word.lower.clone())),
        None => Ok(()),
    }
}

fn require_prefix(
    skeleton: &Skeleton<'_>,
    allowed: &'static [&'static str],
) -> Result<(), RejectionReason> {
    let leading_ws = skeleton.text().len() - skeleton.text().trim_start().len();
    let starts_with_allowed = skeleton
        .words()
        .first()
        .filter(|w| w.start == leading_ws)
        .map(|w| allowed.contains(&w.lower.as_str()))
        .unwrap_or(false);
    if starts_with_allowed {
        Ok(())
    } else {
        Err(RejectionReason::InvalidPrefix(allowed))
    }
}

/// The command name of a key-value command: text before the first space or comma.
pub fn command_name(text: &str) -> String {
    text.trim()
        .split(|c: char| c.is_whitespace() || c == ',')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn validate_command(text: &str, engine: &str) -> Result<(), RejectionReason> {
    if text.is_empty() {
        return Err(RejectionReason::Empty);
    }
    match engine.to_lowercase().as_str() {
        "redis" => {
            let command = command_name(text);
            if REDIS_ALLOWED_COMMANDS.contains(&command.as_str()) {
                Ok(())
            } else {
                Err(RejectionReason::CommandNotAllowed(command))
            }
        }
        "influxdb" => {
            let skeleton = Skeleton::parse(text);
            require_prefix(&skeleton, &["from", "import"])?;
            for word in skeleton.words() {
                if FLUX_FORBIDDEN_CALLS.contains(&word.lower.as_str()) && skeleton.followed_by(word, '(') {
                    return Err(RejectionReason::ForbiddenCall(word.lower.clone()));
                }
            }
            Ok(())
        }
        // PromQL and LogQL have no write forms.
        _ => Ok(()),
    }
}

fn validate_document(text: &str, engine: &str) -> Result<(), RejectionReason> {
    if text.is_empty() {
        return Err(RejectionReason::Empty);
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(_)) => {}
        _ => return Err(RejectionReason::NotAMapping),
    }
    if matches!(engine.to_lowercase().as_str(), "elasticsearch" | "opensearch") {
        let lowered = text.to_lowercase();
        let hit = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .find(|token| SEARCH_FORBIDDEN.contains(token));
        if let Some(word) = hit {
            return Err(RejectionReason::ForbiddenKeyword(word.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(text: &str) -> Result<ValidatedQuery, RejectionReason> {
        SafetyGate::new().validate(text, "postgresql", QueryKind::Sql, None)
    }

    #[test]
    fn test_sql_accepts_plain_select() {
        let validated = sql("  SELECT id, name FROM customers LIMIT 10 ").unwrap();
        assert_eq!(validated.text, "SELECT id, name FROM customers LIMIT 10");
        assert!(!validated.needs_from);
    }

    #[test]
    fn test_sql_rejects_empty() {
        assert_eq!(sql("   ").unwrap_err(), RejectionReason::Empty);
    }

    #[test]
    fn test_drop_table_cites_drop() {
        let reason = sql("DROP TABLE users").unwrap_err();
        assert_eq!(reason, RejectionReason::ForbiddenKeyword("drop".into()));
        assert!(reason.to_string().contains("drop"));
    }

    #[test]
    fn test_sql_rejects_every_forbidden_keyword() {
        for keyword in SQL_FORBIDDEN {
            let query = format!("SELECT * FROM t; {} something", keyword.to_uppercase());
            assert_eq!(
                sql(&query).unwrap_err(),
                RejectionReason::ForbiddenKeyword(keyword.to_string()),
                "{}",
                query
            );
        }
    }

    #[test]
    fn test_sql_rejects_non_select() {
        assert_eq!(
            sql("WITH x AS (SELECT 1) SELECT * FROM x").unwrap_err(),
            RejectionReason::InvalidPrefix(&["select"])
        );
        assert_eq!(
            sql("EXPLAIN SELECT * FROM t").unwrap_err(),
            RejectionReason::InvalidPrefix(&["select"])
        );
        assert!(sql("selection FROM t").is_err());
    }

    #[test]
    fn test_sql_keywords_inside_literals_are_ignored() {
        assert!(sql("SELECT * FROM logs WHERE action = 'delete'").is_ok());
        assert!(sql("SELECT last_update FROM t").is_ok());
    }

    #[test]
    fn test_sql_without_from_needs_a_hint() {
        assert_eq!(sql("SELECT id LIMIT 5").unwrap_err(), RejectionReason::MissingFrom);

        let validated = SafetyGate::new()
            .validate("SELECT id LIMIT 5", "mysql", QueryKind::Sql, Some("customers"))
            .unwrap();
        assert!(validated.needs_from);

        let blank_hint = SafetyGate::new().validate("SELECT id", "mysql", QueryKind::Sql, Some(" "));
        assert_eq!(blank_hint.unwrap_err(), RejectionReason::MissingFrom);
    }

    #[test]
    fn test_cypher_policy() {
        let gate = SafetyGate::new();
        assert!(gate
            .validate("MATCH (n:DevOps) RETURN n LIMIT 10", "neo4j", QueryKind::GraphCypher, None)
            .is_ok());
        assert!(gate
            .validate("CALL db.labels()", "neo4j", QueryKind::GraphCypher, None)
            .is_ok());
        assert_eq!(
            gate.validate("MATCH (n) SET n.x = 1", "neo4j", QueryKind::GraphCypher, None)
                .unwrap_err(),
            RejectionReason::ForbiddenKeyword("set".into())
        );
        assert_eq!(
            gate.validate("RETURN 1", "neo4j", QueryKind::GraphCypher, None)
                .unwrap_err(),
            RejectionReason::InvalidPrefix(&["match", "call"])
        );
    }

    #[test]
    fn test_formula_policy() {
        let gate = SafetyGate::new();
        assert!(gate
            .validate("select A, B where A > 10", "googlesheet", QueryKind::Formula, None)
            .is_ok());
        assert_eq!(
            gate.validate("select A where B = 1 delete", "googlesheet", QueryKind::Formula, None)
                .unwrap_err(),
            RejectionReason::ForbiddenKeyword("delete".into())
        );
        assert!(gate
            .validate("pivot A", "googlesheet", QueryKind::Formula, None)
            .is_err());
    }

    #[test]
    fn test_redis_allowlist() {
        let gate = SafetyGate::new();
        for command in ["GET key", "mget a, b", "HGETALL user:1", "lrange logs, 0, 10", "scan 0"] {
            assert!(gate.validate(command, "redis", QueryKind::Command, None).is_ok(), "{}", command);
        }
        assert_eq!(
            gate.validate("SET key value", "redis", QueryKind::Command, None)
                .unwrap_err(),
            RejectionReason::CommandNotAllowed("set".into())
        );
        assert_eq!(
            gate.validate("flushall", "redis", QueryKind::Command, None)
                .unwrap_err(),
            RejectionReason::CommandNotAllowed("flushall".into())
        );
    }

    #[test]
    fn test_flux_policy() {
        let gate = SafetyGate::new();
        assert!(gate
            .validate(
                r#"from(bucket:"b") |> range(start:-1h)"#,
                "influxdb",
                QueryKind::Command,
                None
            )
            .is_ok());
        assert_eq!(
            gate.validate(
                r#"from(bucket:"b") |> range(start:-1h) |> to(bucket:"c")"#,
                "influxdb",
                QueryKind::Command,
                None
            )
            .unwrap_err(),
            RejectionReason::ForbiddenCall("to".into())
        );
        assert!(gate
            .validate("buckets()", "influxdb", QueryKind::Command, None)
            .is_err());
    }

    #[test]
    fn test_promql_only_needs_text() {
        let gate = SafetyGate::new();
        assert!(gate
            .validate("rate(http_requests_total[5m])", "prometheus", QueryKind::Command, None)
            .is_ok());
        assert_eq!(
            gate.validate("", "loki", QueryKind::Command, None).unwrap_err(),
            RejectionReason::Empty
        );
    }

    #[test]
    fn test_document_filter_policy() {
        let gate = SafetyGate::new();
        assert!(gate
            .validate(r#"{"age": {"$gt": 30}}"#, "mongodb", QueryKind::DocumentFilter, None)
            .is_ok());
        assert_eq!(
            gate.validate("age > 30", "mongodb", QueryKind::DocumentFilter, None)
                .unwrap_err(),
            RejectionReason::NotAMapping
        );
        assert_eq!(
            gate.validate(r#""match_all""#, "elasticsearch", QueryKind::DocumentFilter, None)
                .unwrap_err(),
            RejectionReason::NotAMapping
        );
    }

    #[test]
    fn test_search_dsl_rejects_destructive_words() {
        let gate = SafetyGate::new();
        assert!(gate
            .validate(
                r#"{"query": {"match": {"last_updated_by": "x"}}}"#,
                "opensearch",
                QueryKind::DocumentFilter,
                None
            )
            .is_ok());
        assert_eq!(
            gate.validate(
                r#"{"script": "_delete_by_query"}"#,
                "elasticsearch",
                QueryKind::DocumentFilter,
                None
            )
            .unwrap_err(),
            RejectionReason::ForbiddenKeyword("delete".into())
        );
        assert!(gate
            .validate(r#"{"reindex": true}"#, "opensearch", QueryKind::DocumentFilter, None)
            .is_err());
        // Document stores are not scanned for search verbs.
        assert!(gate
            .validate(r#"{"status": "update"}"#, "mongodb", QueryKind::DocumentFilter, None)
            .is_ok());
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name("LRANGE logs, 0, 10"), "lrange");
        assert_eq!(command_name("get,key"), "get");
        assert_eq!(command_name(""), "");
    }
}
