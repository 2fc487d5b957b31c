use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use dataflow::commands::{self, config::OutputFormat, parse::ParseOptions};
use dataflow::display;

/// dataflow CLI - table and view lineage for SQL scripts
#[derive(Parser)]
#[clap(name = "dataflow", about = "dataflow - SQL lineage extraction", version)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a SQL file or directory and print its lineage
    Parse {
        /// SQL file, or directory searched recursively
        path: PathBuf,

        /// SQL dialect (see `dataflow dialects`)
        #[clap(short, long)]
        dialect: Option<String>,

        /// Output format for the graph
        #[clap(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Only keep these nodes and their ancestors and descendants
        #[clap(long)]
        focus: Vec<String>,

        /// Path to the configuration file (defaults to ./dataflow.yaml)
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// Directory for edges.json, node_types.json and stats.json
        #[clap(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// List supported dialects
    Dialects,

    /// Show version information
    Version,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Parse {
            path,
            dialect,
            format,
            focus,
            config,
            output_dir,
        } => {
            let options = ParseOptions {
                path,
                dialect,
                format,
                focus,
                config,
                output_dir,
            };
            if let Err(err) = commands::parse::parse_command(&options) {
                eprintln!("Error: {:#}", err);
                process::exit(1);
            }
        }
        Command::Dialects => commands::dialects_command(),
        Command::Version => display::display_version(),
    }
}
