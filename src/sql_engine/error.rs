//! Error types for lineage extraction

use thiserror::Error;

use super::dialects::DialectKind;

/// Errors that abort a whole parse call.
///
/// Problems local to one statement or one reference never surface here: a
/// statement that fails to parse is recorded in
/// [`LineageGraph::skipped`](super::lineage::LineageGraph::skipped) and an
/// unresolvable reference is simply left out.
#[derive(Debug, Error)]
pub enum LineageError {
    /// The input is empty or does not look like SQL at all.
    #[error("invalid SQL: {0}")]
    InvalidSql(String),

    /// The parser could not build a tree for any statement of the input.
    #[error("failed to parse SQL with the {dialect} dialect: {message}")]
    Parse { dialect: DialectKind, message: String },

    #[error("unknown SQL dialect: {0}")]
    UnknownDialect(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = LineageError> = std::result::Result<T, E>;
