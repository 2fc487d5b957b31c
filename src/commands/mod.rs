pub mod config;
pub mod parse;

use colored::Colorize;

use crate::sql_engine::dialects::DialectKind;

/// Print the dialect labels accepted by `--dialect`
pub fn dialects_command() {
    println!("{}", "Supported dialects:".green());
    for kind in DialectKind::ALL {
        println!("  {}", kind.name());
    }
}
