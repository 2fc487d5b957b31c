//! Graph views over a `LineageGraph`: petgraph conversion, focused
//! sub-graphs, cycle detection, DOT rendering and JSON export.

use log::debug;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use super::error::Result;
use super::lineage::LineageGraph;
use super::nodes::NodeKind;
use super::stats::schema_stats;

/// A petgraph view of the lineage with the index of every node name.
///
/// Edges point from dependency to dependent.
pub struct PetLineage {
    pub graph: DiGraph<String, ()>,
    pub indices: BTreeMap<String, NodeIndex>,
}

impl PetLineage {
    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.indices.get(name).copied()
    }

    fn name(&self, index: NodeIndex) -> Option<&str> {
        self.graph.node_weight(index).map(String::as_str)
    }
}

pub fn to_petgraph(lineage: &LineageGraph) -> PetLineage {
    let mut graph = DiGraph::new();
    let mut indices = BTreeMap::new();

    let edge_names = lineage
        .edges
        .iter()
        .flat_map(|e| [e.dependency.as_str(), e.dependent.as_str()]);
    for name in lineage.nodes.keys().map(String::as_str).chain(edge_names) {
        if !indices.contains_key(name) {
            let index = graph.add_node(name.to_string());
            indices.insert(name.to_string(), index);
        }
    }

    for edge in &lineage.edges {
        if let (Some(&from), Some(&to)) = (indices.get(&edge.dependency), indices.get(&edge.dependent)) {
            graph.add_edge(from, to, ());
        }
    }

    PetLineage { graph, indices }
}

/// Keep the focus nodes and everything upstream or downstream of them.
///
/// Unknown focus names are ignored; returns `None` when none of them exist.
pub fn focus<S: AsRef<str>>(lineage: &LineageGraph, focus_nodes: &[S]) -> Option<LineageGraph> {
    let pet = to_petgraph(lineage);
    let starts: Vec<NodeIndex> = focus_nodes
        .iter()
        .filter_map(|name| {
            let index = pet.index_of(name.as_ref());
            if index.is_none() {
                debug!("Focus node {} is not in the graph", name.as_ref());
            }
            index
        })
        .collect();
    if starts.is_empty() {
        return None;
    }

    let mut keep = BTreeSet::new();
    for &start in &starts {
        let mut downstream = Bfs::new(&pet.graph, start);
        while let Some(index) = downstream.next(&pet.graph) {
            keep.extend(pet.name(index).map(str::to_string));
        }
        let upstream_graph = Reversed(&pet.graph);
        let mut upstream = Bfs::new(upstream_graph, start);
        while let Some(index) = upstream.next(upstream_graph) {
            keep.extend(pet.name(index).map(str::to_string));
        }
    }

    let nodes: BTreeMap<_, _> = lineage
        .nodes
        .iter()
        .filter(|(name, _)| keep.contains(*name))
        .map(|(name, info)| (name.clone(), info.clone()))
        .collect();
    let edges = lineage
        .edges
        .iter()
        .filter(|e| keep.contains(&e.dependency) && keep.contains(&e.dependent))
        .cloned()
        .collect();
    let stats = schema_stats(nodes.values());

    Some(LineageGraph {
        edges,
        nodes,
        stats,
        skipped: lineage.skipped.clone(),
    })
}

/// Strongly connected components with more than one node, each sorted by name.
pub fn detect_cycles(lineage: &LineageGraph) -> Vec<Vec<String>> {
    let pet = to_petgraph(lineage);
    let mut cycles: Vec<Vec<String>> = tarjan_scc(&pet.graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut names: Vec<String> = component
                .into_iter()
                .filter_map(|index| pet.name(index).map(str::to_string))
                .collect();
            names.sort();
            names
        })
        .collect();
    cycles.sort();
    cycles
}

fn dot_style(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Table => "shape=box, style=filled, fillcolor=lightblue",
        NodeKind::View => "shape=ellipse, style=filled, fillcolor=lightgreen",
        NodeKind::MaterializedView => "shape=box3d, style=filled, fillcolor=palegreen",
        NodeKind::CteView => "shape=ellipse, style=dashed, color=gray40",
        NodeKind::Unknown => "shape=box, style=dotted",
    }
}

fn dot_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render the lineage as a Graphviz digraph.
pub fn to_dot(lineage: &LineageGraph) -> String {
    let mut result = String::from("digraph lineage {\n");
    result.push_str("  rankdir=LR;\n");
    result.push_str("  node [fontname=\"Helvetica\"];\n");

    for (name, info) in &lineage.nodes {
        let label = match &info.schema {
            Some(schema) => format!("{}\\n({}, {})", dot_escape(name), dot_escape(schema), info.kind),
            None => format!("{}\\n({})", dot_escape(name), info.kind),
        };
        result.push_str(&format!(
            "  \"{}\" [label=\"{}\", {}];\n",
            dot_escape(name),
            label,
            dot_style(info.kind)
        ));
    }

    for edge in &lineage.edges {
        result.push_str(&format!(
            "  \"{}\" -> \"{}\";\n",
            dot_escape(&edge.dependency),
            dot_escape(&edge.dependent)
        ));
    }

    result.push_str("}\n");
    result
}

/// Write `edges.json`, `node_types.json` and `stats.json` into `dir`,
/// creating it if needed.
pub fn write_json_files(lineage: &LineageGraph, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join("edges.json"), serde_json::to_string_pretty(&lineage.edges)?)?;
    fs::write(
        dir.join("node_types.json"),
        serde_json::to_string_pretty(&lineage.nodes)?,
    )?;
    fs::write(dir.join("stats.json"), serde_json::to_string_pretty(&lineage.stats)?)?;
    debug!("Wrote lineage JSON files to {}", dir.display());
    Ok(())
}
