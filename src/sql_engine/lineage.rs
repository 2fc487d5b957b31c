//! Table-level lineage extraction for SQL scripts
//!
//! Every statement goes through the same stages: CTEs of its `WITH` clause
//! are registered and linked to what their bodies read, then the object the
//! statement creates (if any) is registered and linked to what its main body
//! reads. A table used only inside a CTE therefore feeds the CTE, and the CTE
//! feeds the created object; the table never links to the object directly.
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sqlparser::ast::{Query, Statement};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use super::dialects::{strategy_for, DialectKind, DialectStrategy};
use super::error::Result;
use super::extractors::{
    cte_name, find_body_dependencies, find_dependencies, query_ctes, CteScope,
};
use super::heuristics::{KindGuesser, NamingHeuristic};
use super::nodes::{NodeInfo, NodeKind, NodeRegistry, ObjectRef};
use super::script::{parse_script, SkippedStatement};
use super::stats::schema_stats;

/// A lineage edge: data in `dependency` flows into `dependent`.
///
/// Serialized as a `[dependency, dependent]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "(String, String)", from = "(String, String)")]
pub struct Edge {
    pub dependency: String,
    pub dependent: String,
}

impl Edge {
    pub fn new(dependency: impl Into<String>, dependent: impl Into<String>) -> Self {
        Self {
            dependency: dependency.into(),
            dependent: dependent.into(),
        }
    }
}

impl From<Edge> for (String, String) {
    fn from(edge: Edge) -> Self {
        (edge.dependency, edge.dependent)
    }
}

impl From<(String, String)> for Edge {
    fn from((dependency, dependent): (String, String)) -> Self {
        Self {
            dependency,
            dependent,
        }
    }
}

/// Edges in insertion order, without duplicates or self-loops
#[derive(Debug, Default)]
pub struct EdgeSet {
    edges: Vec<Edge>,
    seen: HashSet<Edge>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the edge was new.
    pub fn insert(&mut self, dependency: &str, dependent: &str) -> bool {
        if dependency == dependent {
            return false;
        }
        let edge = Edge::new(dependency, dependent);
        if !self.seen.insert(edge.clone()) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    pub fn contains(&self, dependency: &str, dependent: &str) -> bool {
        self.seen.contains(&Edge::new(dependency, dependent))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn into_vec(self) -> Vec<Edge> {
        self.edges
    }
}

/// Result of one parse call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageGraph {
    /// Edges in the order they were discovered
    pub edges: Vec<Edge>,
    /// Nodes keyed by base name, sorted
    pub nodes: BTreeMap<String, NodeInfo>,
    /// Number of non-CTE objects per schema
    pub stats: BTreeMap<String, usize>,
    /// Statements left out because they did not parse
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedStatement>,
}

impl LineageGraph {
    pub fn node(&self, name: &str) -> Option<&NodeInfo> {
        self.nodes.get(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<NodeKind> {
        self.nodes.get(name).map(|node| node.kind)
    }

    pub fn has_edge(&self, dependency: &str, dependent: &str) -> bool {
        self.edges
            .iter()
            .any(|e| e.dependency == dependency && e.dependent == dependent)
    }

    /// Names that feed `name` directly
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.dependent == name)
            .map(|e| e.dependency.as_str())
            .collect()
    }

    /// Names fed by `name` directly
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.dependency == name)
            .map(|e| e.dependent.as_str())
            .collect()
    }
}

/// Builds lineage statement by statement.
///
/// Owns the node registry and edge set for exactly one parse call; statements
/// must be fed in document order because later definitions refine the kinds
/// of names seen earlier.
pub struct LineageBuilder<'a> {
    strategy: &'a dyn DialectStrategy,
    guesser: &'a dyn KindGuesser,
    registry: NodeRegistry,
    edges: EdgeSet,
}

impl<'a> LineageBuilder<'a> {
    pub fn new(strategy: &'a dyn DialectStrategy, guesser: &'a dyn KindGuesser) -> Self {
        Self {
            strategy,
            guesser,
            registry: NodeRegistry::new(),
            edges: EdgeSet::new(),
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn edges(&self) -> &EdgeSet {
        &self.edges
    }

    pub fn process_statement(&mut self, statement: &Statement) {
        let (scope, cte_bodies) = match self.strategy.defining_query(statement) {
            Some(query) => self.register_ctes(query),
            None => (CteScope::new(), Vec::new()),
        };

        for (name, body) in &cte_bodies {
            for dependency in find_dependencies(*body, &scope) {
                self.link(&dependency, name, &scope);
            }
        }

        let Some(created) = self.strategy.detect_created_object(statement) else {
            debug!("Statement creates no lineage node, skipping: {:.80}", statement.to_string());
            return;
        };
        let Some(reference) = ObjectRef::from_object_name(created.name) else {
            debug!("Created object has no usable name: {}", created.name);
            return;
        };
        let Some(target) =
            self.registry
                .register(&reference, created.kind, Some(statement.to_string()))
        else {
            return;
        };
        debug!("Found created object: {} ({})", reference.full_name, created.kind);

        if let Some(query) = created.query {
            // CTE bodies were linked above; only the main body feeds the target
            for dependency in find_body_dependencies(query, &scope) {
                self.link(&dependency, &target, &scope);
            }
        }
    }

    fn register_ctes<'q>(&mut self, query: &'q Query) -> (CteScope, Vec<(String, &'q Query)>) {
        let mut scope = CteScope::new();
        let mut bodies = Vec::new();

        for cte in query_ctes(query) {
            let Some(name) = cte_name(cte) else {
                continue;
            };
            let Some(reference) = ObjectRef::bare(&name) else {
                continue;
            };
            self.registry
                .register(&reference, NodeKind::CteView, Some(cte.to_string()));
            scope.declare(&name);
            bodies.push((name, &*cte.query));
        }

        (scope, bodies)
    }

    fn link(&mut self, dependency: &ObjectRef, target: &str, scope: &CteScope) {
        let base = dependency.base.as_str();
        let registered = if scope.contains(base) {
            self.registry.register(dependency, NodeKind::CteView, None)
        } else if let Some(kind) = self.registry.kind_of(base) {
            self.registry.register(dependency, kind, None)
        } else {
            let guessed = self.guesser.guess(base);
            self.registry.register_inferred(dependency, guessed)
        };

        if let Some(dependency_base) = registered {
            if self.edges.insert(&dependency_base, target) {
                debug!("Edge {} -> {}", dependency_base, target);
            }
        }
    }

    pub fn finish(self, skipped: Vec<SkippedStatement>) -> LineageGraph {
        let stats = schema_stats(self.registry.iter().map(|(_, node)| node));
        LineageGraph {
            edges: self.edges.into_vec(),
            nodes: self.registry.into_nodes(),
            stats,
            skipped,
        }
    }
}

/// Extract lineage from a SQL script.
pub fn extract_lineage(
    sql: &str,
    strategy: &dyn DialectStrategy,
    guesser: &dyn KindGuesser,
) -> Result<LineageGraph> {
    let script = parse_script(sql, strategy)?;

    let mut builder = LineageBuilder::new(strategy, guesser);
    for statement in &script.statements {
        builder.process_statement(statement);
    }
    let graph = builder.finish(script.skipped);

    info!(
        "{} parsing complete. Found {} nodes and {} edges ({} statements skipped)",
        strategy.kind(),
        graph.nodes.len(),
        graph.edges.len(),
        graph.skipped.len()
    );
    Ok(graph)
}

/// Extract lineage with the default strategy for `dialect` and the naming heuristic.
pub fn parse_sql(sql: &str, dialect: DialectKind) -> Result<LineageGraph> {
    let strategy = strategy_for(dialect);
    extract_lineage(sql, strategy.as_ref(), &NamingHeuristic::default())
}

/// Read a SQL file and extract its lineage.
pub fn parse_file(
    path: &Path,
    strategy: &dyn DialectStrategy,
    guesser: &dyn KindGuesser,
) -> Result<LineageGraph> {
    let content = fs::read_to_string(path)?;
    info!("Starting {} parsing for: {}", strategy.kind(), path.display());
    extract_lineage(&content, strategy, guesser)
}
