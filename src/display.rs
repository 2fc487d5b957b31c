use colored::*;
use std::fmt::Write;

use crate::sql_engine::graph::detect_cycles;
use crate::sql_engine::lineage::LineageGraph;
use crate::sql_engine::nodes::NodeKind;

/// Returns the compact banner printed before a parse run
pub fn get_banner() -> String {
    let banner = r#"
     _       _         __ _
  __| | __ _| |_ __ _ / _| | _____      __
 / _` |/ _` | __/ _` | |_| |/ _ \ \ /\ / /
| (_| | (_| | || (_| |  _| | (_) \ V  V /
 \__,_|\__,_|\__\__,_|_| |_|\___/ \_/\_/
    "#;

    banner.to_string()
}

/// Returns a colored version of the banner
pub fn get_colored_banner() -> ColoredString {
    get_banner().bright_cyan()
}

/// Display version information with the banner
pub fn display_version() {
    println!("{}", get_colored_banner());
    println!("dataflow version {}", env!("CARGO_PKG_VERSION"));
    println!("Table and view lineage for SQL scripts");
    println!("Repository: {}", env!("CARGO_PKG_REPOSITORY"));
}

/// Display the banner at the start of a text-mode parse
pub fn print_banner() {
    println!("{}", get_colored_banner());
}

fn colored_kind(kind: NodeKind) -> ColoredString {
    match kind {
        NodeKind::Table => kind.as_str().blue(),
        NodeKind::View => kind.as_str().green(),
        NodeKind::MaterializedView => kind.as_str().bright_green(),
        NodeKind::CteView => kind.as_str().dimmed(),
        NodeKind::Unknown => kind.as_str().yellow(),
    }
}

/// Human-readable summary of a lineage graph
pub fn render_text(graph: &LineageGraph) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\n--- {} ---", "Nodes".green());
    for (name, info) in &graph.nodes {
        let schema = info.schema.as_deref().unwrap_or("-");
        let guessed = if info.inferred { " (guessed)" } else { "" };
        let _ = writeln!(
            out,
            "  {:<32} {:<18} {}{}",
            name.bold(),
            colored_kind(info.kind),
            schema,
            guessed.dimmed()
        );
    }

    let _ = writeln!(out, "\n--- {} ---", "Dependencies".green());
    if graph.edges.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for name in graph.nodes.keys() {
        let upstream = graph.dependencies_of(name);
        if upstream.is_empty() {
            continue;
        }
        let _ = writeln!(out, "  {} <- {}", name.bold(), upstream.join(", "));
    }

    if !graph.stats.is_empty() {
        let _ = writeln!(out, "\n--- {} ---", "Objects per schema".green());
        for (schema, count) in &graph.stats {
            let _ = writeln!(out, "  {:<24} {}", schema, count);
        }
    }

    let cycles = detect_cycles(graph);
    if !cycles.is_empty() {
        let _ = writeln!(out, "\n--- {} ---", "Circular Dependencies Detected".red());
        for (i, cycle) in cycles.iter().enumerate() {
            let _ = writeln!(out, "Cycle {}: {}", i + 1, cycle.join(" → "));
        }
    }

    if !graph.skipped.is_empty() {
        let _ = writeln!(out, "\n--- {} ---", "Skipped statements".yellow());
        for skipped in &graph.skipped {
            let first_line = skipped.sql.lines().next().unwrap_or_default();
            let _ = writeln!(
                out,
                "  #{} {}: {}",
                skipped.index + 1,
                first_line,
                skipped.error.red()
            );
        }
    }

    out
}

pub fn print_text(graph: &LineageGraph) {
    print!("{}", render_text(graph));
}
