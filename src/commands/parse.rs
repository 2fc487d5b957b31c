use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use super::config::{read_config, DataflowConfig, OutputFormat};
use crate::display;
use crate::sql_engine::dialects::{strategy_for, DialectKind};
use crate::sql_engine::graph::{focus, to_dot, write_json_files};
use crate::sql_engine::lineage::{parse_file, LineageGraph};

/// Options of one `dataflow parse` invocation, after CLI parsing
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub path: PathBuf,
    pub dialect: Option<String>,
    pub format: Option<OutputFormat>,
    pub focus: Vec<String>,
    pub config: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

/// Lineage of one input file
#[derive(Debug)]
pub struct FileLineage {
    pub path: PathBuf,
    pub graph: LineageGraph,
}

/// Run the parse command
pub fn parse_command(options: &ParseOptions) -> Result<()> {
    let config = read_config(options.config.clone())?;
    let start_time = Instant::now();

    let dialect = resolve_dialect(options.dialect.as_deref(), &config);
    let format = options.format.unwrap_or(config.format);

    if format == OutputFormat::Text {
        display::print_banner();
        println!(
            "{}",
            format!("Parsing SQL in: {} ({})", options.path.display(), dialect).green()
        );
    }

    let results = parse_path(&options.path, dialect, &config)?;

    if format == OutputFormat::Text {
        println!(
            "Parsed {} file(s) in {:.2?}",
            results.len(),
            start_time.elapsed()
        );
    }

    for (i, result) in results.iter().enumerate() {
        let graph = if options.focus.is_empty() {
            result.graph.clone()
        } else {
            match focus(&result.graph, &options.focus) {
                Some(graph) => graph,
                None => {
                    eprintln!(
                        "{}",
                        format!(
                            "None of the focus nodes were found in {}",
                            result.path.display()
                        )
                        .yellow()
                    );
                    continue;
                }
            }
        };

        render(&result.path, &graph, format)?;

        if let Some(output_dir) = &options.output_dir {
            let target = export_dir(output_dir, &result.path, i, results.len());
            write_json_files(&graph, &target)
                .with_context(|| format!("Failed to write JSON files to {}", target.display()))?;
            if format == OutputFormat::Text {
                println!("JSON files written to {}", target.display());
            }
        }
    }

    Ok(())
}

/// `--dialect` wins over the config; unknown labels fall back to generic.
pub fn resolve_dialect(cli_dialect: Option<&str>, config: &DataflowConfig) -> DialectKind {
    DialectKind::from_label(cli_dialect.unwrap_or(&config.dialect))
}

/// Parse a single file, or every matching file under a directory.
///
/// Each file is an independent parse; a file that fails is reported and
/// skipped unless it was the only input.
pub fn parse_path(
    path: &Path,
    dialect: DialectKind,
    config: &DataflowConfig,
) -> Result<Vec<FileLineage>> {
    let strategy = strategy_for(dialect);
    let guesser = config.kind_guesser();

    if path.is_file() {
        let graph = parse_file(path, strategy.as_ref(), guesser.as_ref())
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        return Ok(vec![FileLineage {
            path: path.to_path_buf(),
            graph,
        }]);
    }

    if !path.is_dir() {
        bail!("Input path does not exist: {}", path.display());
    }

    let files = find_sql_files(path, config);
    if files.is_empty() {
        bail!(
            "No files with extensions [{}] found in {}",
            config.extensions.join(", "),
            path.display()
        );
    }

    let mut results = Vec::new();
    for file in files {
        match parse_file(&file, strategy.as_ref(), guesser.as_ref()) {
            Ok(graph) => results.push(FileLineage { path: file, graph }),
            Err(err) => eprintln!("{} {}: {}", "Error parsing".red(), file.display(), err),
        }
    }

    Ok(results)
}

/// Find all files with a configured extension in the given directory (recursively)
fn find_sql_files(dir: &Path, config: &DataflowConfig) -> Vec<PathBuf> {
    let mut sql_files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && config.accepts(path))
        .collect();
    sql_files.sort();
    sql_files
}

fn render(path: &Path, graph: &LineageGraph, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("\n{} {}", "File:".bold(), path.display());
            display::print_text(graph);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(graph)?),
        OutputFormat::Dot => println!("{}", to_dot(graph)),
    }
    Ok(())
}

// One sub-directory per input file when several files are exported
fn export_dir(output_dir: &Path, input: &Path, index: usize, total: usize) -> PathBuf {
    if total <= 1 {
        return output_dir.to_path_buf();
    }
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("file_{}", index));
    output_dir.join(stem)
}
