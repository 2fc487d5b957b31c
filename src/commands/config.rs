use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sql_engine::heuristics::{default_view_markers, KindGuessMode, KindGuesser};

/// Name of the configuration file looked up in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "dataflow.yaml";

/// Output rendering for the parse command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Dot,
}

/// Settings shared by every parse run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataflowConfig {
    /// Dialect label used when `--dialect` is not given
    #[serde(default = "default_dialect")]
    pub dialect: String,

    #[serde(default)]
    pub format: OutputFormat,

    /// How to classify dependencies the script never defines
    #[serde(default)]
    pub kind_guess: KindGuessMode,

    /// Name fragments that make the naming heuristic guess a view
    #[serde(default = "default_view_markers")]
    pub view_markers: Vec<String>,

    /// File extensions picked up when walking a directory
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_dialect() -> String {
    "generic".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["sql".to_string(), "vql".to_string()]
}

impl Default for DataflowConfig {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            format: OutputFormat::default(),
            kind_guess: KindGuessMode::default(),
            view_markers: default_view_markers(),
            extensions: default_extensions(),
        }
    }
}

impl DataflowConfig {
    pub fn kind_guesser(&self) -> Box<dyn KindGuesser> {
        self.kind_guess.build(&self.view_markers)
    }

    /// Whether a file should be parsed when walking a directory
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// Reads the configuration file from the specified path or looks for
/// dataflow.yaml in the current directory.
///
/// An explicit path must exist; a missing default file means defaults.
pub fn read_config(config_path: Option<PathBuf>) -> Result<DataflowConfig> {
    let (config_path, explicit) = match config_path {
        Some(path) => (path, true),
        None => {
            let current_dir = std::env::current_dir()?;
            (current_dir.join(DEFAULT_CONFIG_FILE), false)
        }
    };

    if !config_path.exists() {
        if explicit {
            bail!("Configuration file not found at: {}", config_path.display());
        }
        log::debug!("No {} found, using default settings", DEFAULT_CONFIG_FILE);
        return Ok(DataflowConfig::default());
    }

    let config_str = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let config: DataflowConfig = serde_yaml::from_str(&config_str)
        .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;

    Ok(config)
}
