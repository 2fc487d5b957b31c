//! Per-schema object counts

use std::collections::BTreeMap;

use super::nodes::{NodeInfo, NodeKind};

/// Count nodes per schema.
///
/// CTEs and nodes without a schema are not counted.
pub fn schema_stats<'a, I>(nodes: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a NodeInfo>,
{
    let mut stats = BTreeMap::new();
    for node in nodes {
        if node.kind == NodeKind::CteView {
            continue;
        }
        match node.schema.as_deref() {
            Some(schema) if !schema.is_empty() => {
                *stats.entry(schema.to_string()).or_insert(0) += 1;
            }
            _ => {}
        }
    }
    stats
}
