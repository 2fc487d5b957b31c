//! Kind guessing for dependencies that are referenced but never defined
//!
//! Nothing in a plain `FROM some_name` says whether `some_name` is a table or
//! a view. Guesses made here are stored as inferred and are overwritten as
//! soon as the script defines the object.

use serde::{Deserialize, Serialize};

use super::nodes::NodeKind;

/// Decides the kind of a dependency the registry has never seen.
pub trait KindGuesser {
    fn guess(&self, base_name: &str) -> NodeKind;
}

/// Guesses `View` when the lower-cased name contains one of the markers,
/// `Table` otherwise.
#[derive(Debug, Clone)]
pub struct NamingHeuristic {
    markers: Vec<String>,
}

impl NamingHeuristic {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.into().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

impl Default for NamingHeuristic {
    fn default() -> Self {
        Self::new(default_view_markers())
    }
}

impl KindGuesser for NamingHeuristic {
    fn guess(&self, base_name: &str) -> NodeKind {
        let lowered = base_name.to_lowercase();
        if self.markers.iter().any(|m| lowered.contains(m.as_str())) {
            NodeKind::View
        } else {
            NodeKind::Table
        }
    }
}

/// Every unseen dependency is a table.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTable;

impl KindGuesser for AlwaysTable {
    fn guess(&self, _base_name: &str) -> NodeKind {
        NodeKind::Table
    }
}

/// No guessing: unseen dependencies stay `Unknown` until defined.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeaveUnknown;

impl KindGuesser for LeaveUnknown {
    fn guess(&self, _base_name: &str) -> NodeKind {
        NodeKind::Unknown
    }
}

/// Guessing strategy as named in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindGuessMode {
    #[default]
    Naming,
    Table,
    Unknown,
}

impl KindGuessMode {
    pub fn build(self, view_markers: &[String]) -> Box<dyn KindGuesser> {
        match self {
            KindGuessMode::Naming => Box::new(NamingHeuristic::new(view_markers.iter().cloned())),
            KindGuessMode::Table => Box::new(AlwaysTable),
            KindGuessMode::Unknown => Box::new(LeaveUnknown),
        }
    }
}

pub fn default_view_markers() -> Vec<String> {
    vec!["_v_".to_string(), "_view".to_string()]
}
