//! SQL engine: statement parsing and table-level lineage extraction

pub mod dialects;
pub mod error;
pub mod extractors;
pub mod graph;
pub mod heuristics;
pub mod lineage;
pub mod nodes;
pub mod script;
pub mod stats;

pub use dialects::DialectKind;
pub use error::{LineageError, Result};
pub use lineage::{extract_lineage, parse_file, parse_sql, Edge, LineageGraph};
pub use nodes::{NodeInfo, NodeKind};
