//! dataflow: table and view lineage extraction from SQL scripts

pub mod commands;
pub mod display;
pub mod sql_engine;
