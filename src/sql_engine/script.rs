//! Script front-end: input checks and statement parsing
//!
//! The whole script is handed to sqlparser first. When that fails the
//! script is split into single statements and each is parsed on its own,
//! so one statement the grammar does not support does not hide the lineage
//! of all the others.

use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::ast::Statement;
use sqlparser::parser::Parser as SqlParser;
use std::sync::OnceLock;

use super::dialects::DialectStrategy;
use super::error::{LineageError, Result};

/// A statement the parser could not build a tree for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedStatement {
    /// Position of the statement in the script, starting at 0
    pub index: usize,
    pub sql: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct ParsedScript {
    pub statements: Vec<Statement>,
    pub skipped: Vec<SkippedStatement>,
}

fn sql_signature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(SELECT|CREATE|INSERT|UPDATE|DELETE|WITH|ALTER|DROP|MERGE|REPLACE)\b")
            .expect("valid regex")
    })
}

/// Reject input that is empty or carries none of the usual SQL keywords.
pub fn validate_sql_input(sql: &str) -> Result<()> {
    if sql.trim().is_empty() {
        return Err(LineageError::InvalidSql("SQL content is empty".to_string()));
    }
    if !sql_signature_re().is_match(sql) {
        return Err(LineageError::InvalidSql(
            "no common SQL keywords found".to_string(),
        ));
    }
    Ok(())
}

/// Parse a script with the strategy's dialect.
pub fn parse_script(sql: &str, strategy: &dyn DialectStrategy) -> Result<ParsedScript> {
    validate_sql_input(sql)?;

    let cleaned = strategy.preprocess(sql);
    let dialect = strategy.parser_dialect();

    let whole_error = match SqlParser::parse_sql(dialect.as_ref(), &cleaned) {
        Ok(statements) if statements.is_empty() => {
            return Err(LineageError::InvalidSql(
                "no SQL statements found outside comments".to_string(),
            ));
        }
        Ok(statements) => {
            debug!("Parsed {} statements in one pass", statements.len());
            return Ok(ParsedScript {
                statements,
                skipped: Vec::new(),
            });
        }
        Err(err) => err,
    };

    warn!(
        "Script does not parse as a whole with the {} dialect ({}); parsing statement by statement",
        strategy.kind(),
        whole_error
    );

    let mut script = ParsedScript::default();
    let backslash_escapes = strategy.kind().backslash_escapes();
    for (index, chunk) in split_statements(&cleaned, backslash_escapes)
        .into_iter()
        .enumerate()
    {
        match SqlParser::parse_sql(dialect.as_ref(), &chunk) {
            Ok(mut statements) => script.statements.append(&mut statements),
            Err(err) => {
                warn!("Skipping statement {}: {}", index + 1, err);
                script.skipped.push(SkippedStatement {
                    index,
                    sql: chunk,
                    error: err.to_string(),
                });
            }
        }
    }

    if script.statements.is_empty() {
        return Err(LineageError::Parse {
            dialect: strategy.kind(),
            message: whole_error.to_string(),
        });
    }

    Ok(script)
}

/// Split a script on `;`, ignoring semicolons inside quotes, comments and
/// dollar-quoted bodies. Empty pieces are dropped.
///
/// With `backslash_escapes`, a backslash inside a quoted literal escapes the
/// next character (MySQL and BigQuery strings).
pub fn split_statements(sql: &str, backslash_escapes: bool) -> Vec<String> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i = skip_quoted(bytes, i, quote, backslash_escapes);
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map_or(len, |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(len, |p| i + 2 + p + 2);
            }
            b'$' => match dollar_tag_len(&sql[i..]) {
                Some(tag_len) => {
                    let tag = &sql[i..i + tag_len];
                    let body = i + tag_len;
                    i = sql[body..].find(tag).map_or(len, |p| body + p + tag_len);
                }
                None => i += 1,
            },
            b';' => {
                push_statement(&mut statements, &sql[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    push_statement(&mut statements, &sql[start..]);

    statements
}

fn push_statement(statements: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        statements.push(piece.to_string());
    }
}

fn skip_quoted(bytes: &[u8], open: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if backslash_escapes => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

// `$$` or `$tag$`; `$1` style parameters are not tags
fn dollar_tag_len(s: &str) -> Option<usize> {
    let rest = &s.as_bytes()[1..];
    if rest.first().is_some_and(|b| b.is_ascii_digit()) {
        return None;
    }
    let ident_len = rest
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
        .count();
    (rest.get(ident_len) == Some(&b'$')).then_some(ident_len + 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql_engine::dialects::{strategy_for, DialectKind};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("" ; "empty")]
    #[test_case("   \n\t " ; "whitespace")]
    #[test_case("This is not valid SQL" ; "prose")]
    fn test_invalid_input(sql: &str) {
        assert!(matches!(
            validate_sql_input(sql),
            Err(LineageError::InvalidSql(_))
        ));
    }

    #[test]
    fn test_keyword_check_is_case_insensitive() {
        assert!(validate_sql_input("create view v as select 1").is_ok());
        assert!(validate_sql_input("selected items").is_err());
    }

    #[test]
    fn test_split_respects_quotes_and_comments() {
        let sql = "SELECT 'a;b' FROM t; -- trailing; comment\n\
                   SELECT \"odd;name\" FROM u /* block; comment */;\n\
                   ;\n\
                   SELECT 1";
        assert_eq!(
            split_statements(sql, false),
            vec![
                "SELECT 'a;b' FROM t",
                "-- trailing; comment\nSELECT \"odd;name\" FROM u /* block; comment */",
                "SELECT 1",
            ]
        );
    }

    #[test]
    fn test_split_respects_dollar_quotes() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $body$ SELECT 1; $body$ LANGUAGE sql; SELECT $1";
        let pieces = split_statements(sql, false);
        assert_eq!(pieces.len(), 2);
        assert!(pieces[0].ends_with("LANGUAGE sql"));
        assert_eq!(pieces[1], "SELECT $1");
    }

    #[test]
    fn test_split_handles_doubled_quotes() {
        let pieces = split_statements("SELECT 'it''s; fine'; SELECT 2", false);
        assert_eq!(pieces, vec!["SELECT 'it''s; fine'", "SELECT 2"]);
    }

    #[test]
    fn test_split_with_backslash_escapes() {
        let sql = "SELECT 'it\\'s; x' FROM t; SELECT 2";
        assert_eq!(
            split_statements(sql, true),
            vec!["SELECT 'it\\'s; x' FROM t", "SELECT 2"]
        );
        // without escapes the literal closes at the backslash
        assert_eq!(split_statements(sql, false)[0], "SELECT 'it\\'s");
    }

    #[test]
    fn test_mysql_fallback_keeps_escaped_literals() {
        let strategy = strategy_for(DialectKind::MySql);
        let sql = "CREATE VIEW a AS SELECT 'it\\'s; x' AS note FROM t;\n\
                   CREATE VIEW broken AS SELEC;";
        let script = parse_script(sql, strategy.as_ref()).unwrap();

        assert_eq!(script.statements.len(), 1);
        assert_eq!(script.skipped.len(), 1);
        assert_eq!(script.skipped[0].index, 1);
    }

    #[test_case("-- SELECT later\n" ; "line comment only")]
    #[test_case("/* CREATE VIEW v */" ; "block comment only")]
    #[test_case("/* CREATE */ ;;" ; "semicolons only")]
    fn test_script_without_statements(sql: &str) {
        let strategy = strategy_for(DialectKind::Generic);
        assert!(matches!(
            parse_script(sql, strategy.as_ref()),
            Err(LineageError::InvalidSql(_))
        ));
    }

    #[test]
    fn test_parse_whole_script() {
        let strategy = strategy_for(DialectKind::Generic);
        let script = parse_script("CREATE VIEW v AS SELECT 1; SELECT * FROM v;", strategy.as_ref())
            .unwrap();
        assert_eq!(script.statements.len(), 2);
        assert!(script.skipped.is_empty());
    }

    #[test]
    fn test_broken_statement_is_skipped() {
        let strategy = strategy_for(DialectKind::Generic);
        let sql = "CREATE VIEW v AS SELECT * FROM t;\n\
                   CREATE VIEW broken AS SELEC nonsense FROM;\n\
                   CREATE VIEW w AS SELECT * FROM v;";
        let script = parse_script(sql, strategy.as_ref()).unwrap();

        assert_eq!(script.statements.len(), 2);
        assert_eq!(script.skipped.len(), 1);
        assert_eq!(script.skipped[0].index, 1);
        assert!(script.skipped[0].sql.contains("broken"));
    }

    #[test]
    fn test_nothing_parses() {
        let strategy = strategy_for(DialectKind::Generic);
        let result = parse_script("CREATE nonsense; DROP;", strategy.as_ref());
        assert!(matches!(
            result,
            Err(LineageError::Parse {
                dialect: DialectKind::Generic,
                ..
            })
        ));
    }
}
