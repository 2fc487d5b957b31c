//! Dialect strategies: how each SQL dialect is parsed and which statements create objects

use log::warn;
use regex::Regex;
use sqlparser::ast::{ObjectName, Query, Statement};
use sqlparser::dialect::{
    AnsiDialect, BigQueryDialect, DatabricksDialect, Dialect, DuckDbDialect, GenericDialect,
    HiveDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, RedshiftSqlDialect,
    SQLiteDialect, SnowflakeDialect,
};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use super::error::LineageError;
use super::nodes::NodeKind;

/// Supported dialect tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    Generic,
    Ansi,
    Postgres,
    DuckDb,
    Snowflake,
    BigQuery,
    MySql,
    MsSql,
    Hive,
    Redshift,
    Sqlite,
    Databricks,
}

impl DialectKind {
    pub const ALL: [DialectKind; 12] = [
        DialectKind::Generic,
        DialectKind::Ansi,
        DialectKind::Postgres,
        DialectKind::DuckDb,
        DialectKind::Snowflake,
        DialectKind::BigQuery,
        DialectKind::MySql,
        DialectKind::MsSql,
        DialectKind::Hive,
        DialectKind::Redshift,
        DialectKind::Sqlite,
        DialectKind::Databricks,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DialectKind::Generic => "generic",
            DialectKind::Ansi => "ansi",
            DialectKind::Postgres => "postgres",
            DialectKind::DuckDb => "duckdb",
            DialectKind::Snowflake => "snowflake",
            DialectKind::BigQuery => "bigquery",
            DialectKind::MySql => "mysql",
            DialectKind::MsSql => "mssql",
            DialectKind::Hive => "hive",
            DialectKind::Redshift => "redshift",
            DialectKind::Sqlite => "sqlite",
            DialectKind::Databricks => "databricks",
        }
    }

    /// Best-effort selection from a user supplied label; unknown labels fall
    /// back to the generic dialect.
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_else(|_| {
            warn!("Unknown SQL dialect '{}', falling back to generic", label);
            DialectKind::Generic
        })
    }

    /// Whether `\'` escapes a quote inside string literals
    pub fn backslash_escapes(&self) -> bool {
        matches!(self, DialectKind::MySql | DialectKind::BigQuery)
    }

    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            DialectKind::Generic => Box::new(GenericDialect {}),
            DialectKind::Ansi => Box::new(AnsiDialect {}),
            DialectKind::Postgres => Box::new(PostgreSqlDialect {}),
            DialectKind::DuckDb => Box::new(DuckDbDialect {}),
            DialectKind::Snowflake => Box::new(SnowflakeDialect {}),
            DialectKind::BigQuery => Box::new(BigQueryDialect {}),
            DialectKind::MySql => Box::new(MySqlDialect {}),
            DialectKind::MsSql => Box::new(MsSqlDialect {}),
            DialectKind::Hive => Box::new(HiveDialect {}),
            DialectKind::Redshift => Box::new(RedshiftSqlDialect {}),
            DialectKind::Sqlite => Box::new(SQLiteDialect {}),
            DialectKind::Databricks => Box::new(DatabricksDialect {}),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DialectKind {
    type Err = LineageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_lowercase().as_str() {
            "generic" | "" => DialectKind::Generic,
            "ansi" => DialectKind::Ansi,
            "postgres" | "postgresql" | "pg" => DialectKind::Postgres,
            "duckdb" => DialectKind::DuckDb,
            "snowflake" => DialectKind::Snowflake,
            "bigquery" | "bq" => DialectKind::BigQuery,
            "mysql" | "mariadb" => DialectKind::MySql,
            "mssql" | "tsql" | "sqlserver" => DialectKind::MsSql,
            "hive" => DialectKind::Hive,
            "redshift" => DialectKind::Redshift,
            "sqlite" => DialectKind::Sqlite,
            "databricks" | "spark" | "sparksql" => DialectKind::Databricks,
            _ => return Err(LineageError::UnknownDialect(s.to_string())),
        };
        Ok(kind)
    }
}

/// The object a statement creates
#[derive(Debug, Clone, Copy)]
pub struct CreatedObject<'s> {
    pub name: &'s ObjectName,
    pub kind: NodeKind,
    /// Query the object is built from, if any
    pub query: Option<&'s Query>,
}

/// Adapts the dialect-agnostic orchestrator to one SQL dialect.
///
/// Dependency resolution is shared by all dialects; a strategy only decides
/// how text is parsed and which statements create lineage nodes.
pub trait DialectStrategy {
    fn kind(&self) -> DialectKind;

    fn parser_dialect(&self) -> Box<dyn Dialect> {
        self.kind().parser_dialect()
    }

    /// Clean up dialect specific noise the parser can not handle.
    fn preprocess<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(sql)
    }

    fn detect_created_object<'s>(&self, statement: &'s Statement) -> Option<CreatedObject<'s>> {
        detect_standard_create(statement)
    }

    /// The query whose `WITH` clause and body feed the statement's lineage
    ///
    /// `INSERT ... SELECT` contributes its source query so CTEs declared
    /// there are registered, even though the insert creates no node.
    fn defining_query<'s>(&self, statement: &'s Statement) -> Option<&'s Query> {
        match statement {
            Statement::Query(query) => Some(&**query),
            Statement::Insert(insert) => insert.source.as_deref(),
            _ => self
                .detect_created_object(statement)
                .and_then(|created| created.query),
        }
    }
}

/// `CREATE [OR REPLACE] TABLE` (with or without `AS SELECT`), `VIEW` and
/// `MATERIALIZED VIEW`.
pub fn detect_standard_create(statement: &Statement) -> Option<CreatedObject<'_>> {
    match statement {
        Statement::CreateTable(create) => Some(CreatedObject {
            name: &create.name,
            kind: NodeKind::Table,
            query: create.query.as_deref(),
        }),
        Statement::CreateView {
            name,
            query,
            materialized,
            ..
        } => Some(CreatedObject {
            name,
            kind: if *materialized {
                NodeKind::MaterializedView
            } else {
                NodeKind::View
            },
            query: Some(&**query),
        }),
        _ => None,
    }
}

/// Strategy for dialects that need nothing beyond the standard CREATE forms
#[derive(Debug, Clone, Copy)]
pub struct StandardStrategy {
    kind: DialectKind,
}

impl StandardStrategy {
    pub fn new(kind: DialectKind) -> Self {
        Self { kind }
    }
}

impl DialectStrategy for StandardStrategy {
    fn kind(&self) -> DialectKind {
        self.kind
    }
}

/// PostgreSQL, including scripts produced by `pg_dump`
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresStrategy;

fn alter_schema_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*ALTER\s+SCHEMA\b").expect("valid regex"))
}

fn copy_from_stdin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*COPY\s+.*\s+FROM\s+STDIN").expect("valid regex"))
}

impl DialectStrategy for PostgresStrategy {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    /// Comments out psql meta-commands, `ALTER SCHEMA` lines and inline
    /// `COPY ... FROM STDIN` data blocks.
    fn preprocess<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        let mut cleaned = Vec::new();
        let mut changed = false;
        let mut in_copy = false;

        for line in sql.lines() {
            let trimmed = line.trim();
            if in_copy {
                cleaned.push(format!("-- {}", line));
                changed = true;
                if trimmed == "\\." {
                    in_copy = false;
                }
                continue;
            }
            if copy_from_stdin_re().is_match(trimmed) {
                in_copy = true;
            }
            if in_copy || trimmed.starts_with('\\') || alter_schema_re().is_match(trimmed) {
                cleaned.push(format!("-- {}", trimmed));
                changed = true;
                continue;
            }
            cleaned.push(line.to_string());
        }

        if changed {
            Cow::Owned(cleaned.join("\n"))
        } else {
            Cow::Borrowed(sql)
        }
    }
}

/// Strategy registry keyed on the dialect tag
pub fn strategy_for(kind: DialectKind) -> Box<dyn DialectStrategy> {
    match kind {
        DialectKind::Postgres => Box::new(PostgresStrategy),
        other => Box::new(StandardStrategy::new(other)),
    }
}
