//! Minimal SQL skeleton: word positions outside literals, comments and quoted identifiers.
//!
//! This is not a parser. It only answers "is `from` a standalone word here" and
//! "where does the first top-level trailing clause start", which is all the
//! gateway needs for keyword checks and `FROM` injection.

use crate::error::{GatewayError, Result};

/// A bare word found in query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Lower-cased word text
    pub lower: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Parenthesis nesting depth at the word
    pub depth: u32,
}

/// Clauses that may follow the select list; `FROM` is injected before the first of these.
const TRAILING_CLAUSES: &[&str] = &[
    "where", "group", "having", "window", "qualify", "order", "limit", "offset", "fetch",
    "union", "intersect", "except", "format", "settings",
];

/// Trailing-clause words that are also function names; followed by `(` they are calls.
const FUNCTION_STYLE_CLAUSES: &[&str] = &["format", "settings"];

/// Words that modify a preceding `*` in the select list (`* EXCEPT (col)`).
const STAR_MODIFIERS: &[&str] = &["except", "exclude"];

/// Top-level words that mean the statement already caps its rows.
const ROW_CAPS: &[&str] = &["limit", "fetch"];

#[derive(Debug, Clone)]
pub struct Skeleton<'a> {
    text: &'a str,
    words: Vec<Word>,
}

impl<'a> Skeleton<'a> {
    pub fn parse(text: &'a str) -> Self {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let n = chars.len();
        let offset_at = |i: usize| if i < n { chars[i].0 } else { text.len() };

        let mut words = Vec::new();
        let mut depth: u32 = 0;
        let mut i = 0;

        while i < n {
            let c = chars[i].1;
            let next = chars.get(i + 1).map(|&(_, ch)| ch);
            match c {
                // Quoted runs end at the matching quote; a doubled quote is an escape.
                // Backslash escapes are deliberately not honoured so a dialect that
                // ignores them can never hide words from the scan.
                '\'' | '"' | '`' => {
                    i += 1;
                    while i < n {
                        if chars[i].1 == c {
                            if chars.get(i + 1).map(|&(_, ch)| ch) == Some(c) {
                                i += 2;
                                continue;
                            }
                            break;
                        }
                        i += 1;
                    }
                    i += 1;
                }
                '-' if next == Some('-') => {
                    while i < n && chars[i].1 != '\n' {
                        i += 1;
                    }
                }
                '/' if next == Some('*') => {
                    i += 2;
                    while i < n && !(chars[i].1 == '*' && chars.get(i + 1).map(|&(_, ch)| ch) == Some('/')) {
                        i += 1;
                    }
                    i += 2;
                }
                '(' => {
                    depth += 1;
                    i += 1;
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    i += 1;
                }
                c if c.is_alphabetic() || c == '_' => {
                    let start = i;
                    while i < n && (chars[i].1.is_alphanumeric() || chars[i].1 == '_' || chars[i].1 == '$') {
                        i += 1;
                    }
                    let (start, end) = (offset_at(start), offset_at(i));
                    words.push(Word {
                        lower: text[start..end].to_lowercase(),
                        start,
                        end,
                        depth,
                    });
                }
                c if c.is_ascii_digit() => {
                    while i < n && (chars[i].1.is_alphanumeric() || chars[i].1 == '.' || chars[i].1 == '_') {
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }

        Self { text, words }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn first_word(&self) -> Option<&str> {
        self.words.first().map(|w| w.lower.as_str())
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.words.iter().any(|w| w.lower == word)
    }

    /// First word (in text order) that belongs to `set`.
    pub fn find_any(&self, set: &[&str]) -> Option<&Word> {
        self.words.iter().find(|w| set.contains(&w.lower.as_str()))
    }

    /// First occurrence of `word` outside any parentheses.
    pub fn top_level(&self, word: &str) -> Option<&Word> {
        self.words.iter().find(|w| w.depth == 0 && w.lower == word)
    }

    /// Returns true when the next non-whitespace character after `word` is `ch`.
    pub fn followed_by(&self, word: &Word, ch: char) -> bool {
        self.text[word.end..].trim_start().starts_with(ch)
    }

    /// Returns true when the last non-whitespace character before `word` is `ch`.
    pub fn preceded_by(&self, word: &Word, ch: char) -> bool {
        self.text[..word.start].trim_end().ends_with(ch)
    }

    /// Byte offset where an injected `FROM` belongs: before the first top-level
    /// trailing clause after the select list, or `None` for end of text.
    fn from_insertion_point(&self) -> Option<usize> {
        self.words
            .iter()
            .skip(1)
            .filter(|w| w.depth == 0 && TRAILING_CLAUSES.contains(&w.lower.as_str()))
            .find(|w| !self.is_select_list_word(w))
            .map(|w| w.start)
    }

    /// Function calls and `*` modifiers that share a name with a trailing clause.
    fn is_select_list_word(&self, word: &Word) -> bool {
        let lower = word.lower.as_str();
        (FUNCTION_STYLE_CLAUSES.contains(&lower) && self.followed_by(word, '('))
            || (STAR_MODIFIERS.contains(&lower) && self.preceded_by(word, '*'))
    }

    /// Returns true when the statement already has a top-level row cap.
    fn has_row_cap(&self) -> bool {
        ROW_CAPS.iter().any(|cap| self.top_level(cap).is_some())
    }
}

/// Identifier quoting convention of a SQL engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierStyle {
    /// Unquoted dotted path (Databricks, ClickHouse); only plain identifiers allowed
    Bare,
    /// `"schema"."table"` (Postgres family, Snowflake)
    DoubleQuoted,
    /// `` `schema`.`table` `` (MySQL)
    Backtick,
}

impl IdentifierStyle {
    pub fn quote(&self, ident: &str) -> Result<String> {
        let ident = ident.trim();
        if ident.is_empty() {
            return Err(GatewayError::Validation("empty identifier".to_string()));
        }
        match self {
            IdentifierStyle::Bare => {
                let mut chars = ident.chars();
                let valid_head = chars
                    .next()
                    .map(|c| c.is_ascii_alphabetic() || c == '_')
                    .unwrap_or(false);
                if valid_head && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    Ok(ident.to_string())
                } else {
                    Err(GatewayError::Validation(format!("invalid identifier '{}'", ident)))
                }
            }
            IdentifierStyle::DoubleQuoted => Ok(format!("\"{}\"", ident.replace('"', "\"\""))),
            IdentifierStyle::Backtick => Ok(format!("`{}`", ident.replace('`', "``"))),
        }
    }

    /// Qualified name from the non-empty parts; dotted parts are split first.
    pub fn qualify(&self, parts: &[Option<&str>]) -> Result<String> {
        let quoted = parts
            .iter()
            .flatten()
            .flat_map(|part| part.split('.'))
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| self.quote(segment))
            .collect::<Result<Vec<_>>>()?;
        if quoted.is_empty() {
            return Err(GatewayError::Validation("no table name supplied".to_string()));
        }
        Ok(quoted.join("."))
    }
}

/// Statement to execute for `query`, injecting `FROM table_ref` when the query
/// lacks one and appending `LIMIT` when a row cap is requested and none exists.
pub fn build_statement(query: &str, table_ref: Option<&str>, limit: Option<u64>) -> Result<String> {
    let query = query.trim().trim_end_matches(';').trim_end();

    let mut statement = if query.is_empty() {
        match table_ref {
            Some(table) => format!("SELECT * FROM {}", table),
            None => {
                return Err(GatewayError::Validation(
                    "query is empty and no table was provided".to_string(),
                ))
            }
        }
    } else {
        let skeleton = Skeleton::parse(query);
        if skeleton.contains_word("from") {
            query.to_string()
        } else {
            let table = table_ref.ok_or_else(|| {
                GatewayError::Validation(
                    "query is missing a FROM clause and no table was provided".to_string(),
                )
            })?;
            inject_from(&skeleton, table)
        }
    };

    if let Some(limit) = limit {
        if !Skeleton::parse(&statement).has_row_cap() {
            statement = format!("{} LIMIT {}", statement, limit);
        }
    }

    Ok(statement)
}

fn inject_from(skeleton: &Skeleton<'_>, table: &str) -> String {
    let text = skeleton.text();
    match skeleton.from_insertion_point() {
        Some(at) => format!("{} FROM {} {}", text[..at].trim_end(), table, &text[at..]),
        None => format!("{} FROM {}", text, table),
    }
}
