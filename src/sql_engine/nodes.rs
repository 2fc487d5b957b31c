//! Node registry: classified metadata for every object seen in a script

use serde::{Deserialize, Serialize};
use sqlparser::ast::ObjectName;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of a lineage node.
///
/// Variants are declared in ascending priority, so the derived `Ord` is the
/// order used to resolve conflicting classifications of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Unknown,
    Table,
    MaterializedView,
    View,
    CteView,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Unknown => "unknown",
            NodeKind::Table => "table",
            NodeKind::MaterializedView => "materialized_view",
            NodeKind::View => "view",
            NodeKind::CteView => "cte_view",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata kept for one base name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub kind: NodeKind,
    /// First qualifying segment seen for this name, `None` for CTEs
    pub schema: Option<String>,
    /// Qualified text as written, or the bare name for CTEs
    pub full_name: String,
    /// SQL of the statement (or CTE) defining this object
    pub definition: Option<String>,
    /// Set while `kind` is only a guess for a dependency nobody defined
    #[serde(default)]
    pub inferred: bool,
}

/// A possibly qualified object reference split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Text as written, quotes included
    pub full_name: String,
    /// First qualifying segment, quote-stripped
    pub schema: Option<String>,
    /// Last segment, quote-stripped
    pub base: String,
}

const QUOTE_CHARS: &[char] = &['"', '`', '\'', '[', ']'];

impl ObjectRef {
    /// Split a raw name such as `"db1".orders` into schema and base name.
    ///
    /// Dots inside quoted segments do not split. Returns `None` when nothing
    /// nameable is left once quotes and whitespace are stripped.
    pub fn parse(raw: &str) -> Option<Self> {
        let full_name = raw.trim();
        let parts: Vec<String> = split_qualified(full_name)
            .into_iter()
            .map(|part| strip_quotes(&part).to_string())
            .collect();

        let base = parts.last()?.clone();
        if base.is_empty() {
            return None;
        }
        let schema = if parts.len() > 1 {
            Some(parts[0].clone()).filter(|s| !s.is_empty())
        } else {
            None
        };

        Some(Self {
            full_name: full_name.to_string(),
            schema,
            base,
        })
    }

    /// Build a reference from a parsed object name; identifiers are already unquoted.
    ///
    /// A lone backtick-quoted identifier holding a whole path, as BigQuery
    /// writes `` `project.dataset.table` ``, is split on its dots.
    pub fn from_object_name(name: &ObjectName) -> Option<Self> {
        let parts: Vec<&str> = match name.0.as_slice() {
            [only] if only.quote_style == Some('`') => only.value.split('.').collect(),
            idents => idents.iter().map(|ident| ident.value.as_str()).collect(),
        };

        let base = strip_quotes(parts.last()?).to_string();
        if base.is_empty() {
            return None;
        }
        let schema = if parts.len() > 1 {
            Some(strip_quotes(parts[0]).to_string()).filter(|s| !s.is_empty())
        } else {
            None
        };

        Some(Self {
            full_name: name.to_string(),
            schema,
            base,
        })
    }

    /// An unqualified reference, as used for CTE names.
    pub fn bare(name: &str) -> Option<Self> {
        let base = strip_quotes(name).to_string();
        if base.is_empty() {
            return None;
        }
        Some(Self {
            full_name: base.clone(),
            schema: None,
            base,
        })
    }
}

/// Base name of a possibly qualified, possibly quoted identifier.
pub fn base_name(raw: &str) -> Option<String> {
    ObjectRef::parse(raw).map(|r| r.base)
}

fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches(QUOTE_CHARS)
}

fn split_qualified(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in name.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                current.push(c);
            }
            Some(_) => current.push(c),
            None => match c {
                '"' | '`' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '[' => {
                    quote = Some(']');
                    current.push(c);
                }
                '.' => parts.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    parts.push(current);
    parts
}

/// Registry of every node seen during one parse call.
///
/// Keyed by base name, so `db1.orders` and `db2.orders` end up as the same
/// node. The first schema seen for a name sticks.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, NodeInfo>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }

    /// Add or update a node, returning its base name.
    ///
    /// `definition` is `Some` when the caller registers the statement that
    /// defines the object and `None` for a plain reference.
    pub fn register(
        &mut self,
        reference: &ObjectRef,
        kind: NodeKind,
        definition: Option<String>,
    ) -> Option<String> {
        let base = reference.base.clone();
        if base.is_empty() {
            return None;
        }
        let is_cte = kind == NodeKind::CteView;

        let Some(existing) = self.nodes.get_mut(&base) else {
            self.nodes.insert(
                base.clone(),
                NodeInfo {
                    kind,
                    schema: if is_cte { None } else { reference.schema.clone() },
                    full_name: if is_cte {
                        base.clone()
                    } else {
                        reference.full_name.clone()
                    },
                    definition,
                    inferred: false,
                },
            );
            return Some(base);
        };

        if existing.kind == NodeKind::CteView {
            return Some(base);
        }

        if is_cte {
            existing.kind = NodeKind::CteView;
            existing.schema = None;
            existing.full_name = base.clone();
            existing.inferred = false;
            if definition.is_some() {
                existing.definition = definition;
            }
            return Some(base);
        }

        let reconciles_guess = existing.inferred && definition.is_some();
        if reconciles_guess || kind >= existing.kind {
            existing.kind = kind;
            if definition.is_some() {
                existing.full_name = reference.full_name.clone();
                existing.definition = definition;
                existing.inferred = false;
            }
            if existing.schema.is_none() {
                if let Some(schema) = &reference.schema {
                    existing.schema = Some(schema.clone());
                    if existing.full_name == base {
                        existing.full_name = reference.full_name.clone();
                    }
                }
            }
        }

        Some(base)
    }

    /// Register a dependency whose kind had to be guessed.
    ///
    /// A new node is flagged as inferred so a later definition can correct
    /// it; an existing node is treated as a plain reference of its current kind.
    pub fn register_inferred(&mut self, reference: &ObjectRef, guessed: NodeKind) -> Option<String> {
        match self.nodes.get(&reference.base) {
            Some(existing) => {
                let kind = existing.kind;
                self.register(reference, kind, None)
            }
            None => {
                let base = self.register(reference, guessed, None)?;
                if let Some(node) = self.nodes.get_mut(&base) {
                    node.inferred = true;
                }
                Some(base)
            }
        }
    }

    pub fn get(&self, base: &str) -> Option<&NodeInfo> {
        self.nodes.get(base)
    }

    pub fn kind_of(&self, base: &str) -> Option<NodeKind> {
        self.nodes.get(base).map(|node| node.kind)
    }

    pub fn contains(&self, base: &str) -> bool {
        self.nodes.contains_key(base)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in base-name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &NodeInfo)> {
        self.nodes.iter()
    }

    pub fn into_nodes(self) -> BTreeMap<String, NodeInfo> {
        self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn reference(raw: &str) -> ObjectRef {
        ObjectRef::parse(raw).unwrap()
    }

    #[test_case("orders", None, "orders" ; "bare name")]
    #[test_case("db1.orders", Some("db1"), "orders" ; "schema qualified")]
    #[test_case("cat.db1.orders", Some("cat"), "orders" ; "catalog qualified")]
    #[test_case("\"db1\".\"orders\"", Some("db1"), "orders" ; "double quoted")]
    #[test_case("`db1`.`order.items`", Some("db1"), "order.items" ; "dot inside quotes")]
    #[test_case("[dbo].[orders]", Some("dbo"), "orders" ; "bracket quoted")]
    fn test_parse_reference(raw: &str, schema: Option<&str>, base: &str) {
        let parsed = ObjectRef::parse(raw).unwrap();
        assert_eq!(parsed.schema.as_deref(), schema);
        assert_eq!(parsed.base, base);
        assert_eq!(parsed.full_name, raw);
    }

    #[test]
    fn test_from_object_name() {
        use sqlparser::ast::Ident;

        let path = ObjectName(vec![Ident::with_quote('`', "proj.ds.events")]);
        let parsed = ObjectRef::from_object_name(&path).unwrap();
        assert_eq!(parsed.schema.as_deref(), Some("proj"));
        assert_eq!(parsed.base, "events");

        let quoted = ObjectName(vec![Ident::new("db1"), Ident::with_quote('"', "order.items")]);
        let parsed = ObjectRef::from_object_name(&quoted).unwrap();
        assert_eq!(parsed.schema.as_deref(), Some("db1"));
        assert_eq!(parsed.base, "order.items");
        assert_eq!(parsed.full_name, "db1.\"order.items\"");
    }

    #[test]
    fn test_empty_names_are_not_references() {
        assert!(ObjectRef::parse("").is_none());
        assert!(ObjectRef::parse("\"\"").is_none());
        assert!(ObjectRef::parse("db1.").is_none());
        assert!(ObjectRef::bare("  ").is_none());
        assert_eq!(base_name("db.\"T1\""), Some("T1".to_string()));
    }

    #[test]
    fn test_register_new_node() {
        let mut registry = NodeRegistry::new();
        let base = registry.register(&reference("db1.v"), NodeKind::View, Some("sql".into()));

        assert_eq!(base.as_deref(), Some("v"));
        let node = registry.get("v").unwrap();
        assert_eq!(node.kind, NodeKind::View);
        assert_eq!(node.schema.as_deref(), Some("db1"));
        assert_eq!(node.full_name, "db1.v");
        assert_eq!(node.definition.as_deref(), Some("sql"));
        assert!(!node.inferred);
    }

    #[test_case(&[NodeKind::Table, NodeKind::View], NodeKind::View ; "upgrade table to view")]
    #[test_case(&[NodeKind::View, NodeKind::Table], NodeKind::View ; "no downgrade view to table")]
    #[test_case(&[NodeKind::Unknown, NodeKind::Table], NodeKind::Table ; "unknown upgrades")]
    #[test_case(&[NodeKind::MaterializedView, NodeKind::Table], NodeKind::MaterializedView ; "mview beats table")]
    #[test_case(&[NodeKind::MaterializedView, NodeKind::View], NodeKind::View ; "view beats mview")]
    #[test_case(&[NodeKind::CteView, NodeKind::View], NodeKind::CteView ; "cte absorbs later view")]
    #[test_case(&[NodeKind::Table, NodeKind::CteView, NodeKind::View], NodeKind::CteView ; "cte promotion is final")]
    fn test_kind_is_highest_priority_seen(sequence: &[NodeKind], expected: NodeKind) {
        let mut registry = NodeRegistry::new();
        for kind in sequence {
            registry.register(&reference("db.n"), *kind, None);
        }
        assert_eq!(registry.kind_of("n"), Some(expected));
    }

    #[test]
    fn test_first_schema_wins() {
        let mut registry = NodeRegistry::new();
        registry.register(&reference("db2.n"), NodeKind::Table, None);
        registry.register(&reference("db9.n"), NodeKind::View, None);

        let node = registry.get("n").unwrap();
        assert_eq!(node.kind, NodeKind::View);
        assert_eq!(node.schema.as_deref(), Some("db2"));
    }

    #[test]
    fn test_schema_filled_from_later_qualified_reference() {
        let mut registry = NodeRegistry::new();
        registry.register(&reference("n"), NodeKind::Table, None);
        registry.register(&reference("db3.n"), NodeKind::Table, None);

        let node = registry.get("n").unwrap();
        assert_eq!(node.schema.as_deref(), Some("db3"));
        assert_eq!(node.full_name, "db3.n");
    }

    #[test]
    fn test_cte_promotion_clears_schema() {
        let mut registry = NodeRegistry::new();
        registry.register(&reference("db1.c"), NodeKind::Table, None);
        registry.register(&ObjectRef::bare("c").unwrap(), NodeKind::CteView, Some("c AS (SELECT 1)".into()));
        registry.register(&reference("db2.c"), NodeKind::View, Some("CREATE VIEW".into()));

        let node = registry.get("c").unwrap();
        assert_eq!(node.kind, NodeKind::CteView);
        assert_eq!(node.schema, None);
        assert_eq!(node.full_name, "c");
        assert_eq!(node.definition.as_deref(), Some("c AS (SELECT 1)"));
    }

    #[test]
    fn test_dependency_registration_keeps_definition() {
        let mut registry = NodeRegistry::new();
        registry.register(&reference("db1.v"), NodeKind::View, Some("CREATE VIEW db1.v".into()));
        registry.register(&reference("other.v"), NodeKind::View, None);

        let node = registry.get("v").unwrap();
        assert_eq!(node.definition.as_deref(), Some("CREATE VIEW db1.v"));
        assert_eq!(node.full_name, "db1.v");
    }

    #[test]
    fn test_inferred_kind_is_reconciled_by_definition() {
        let mut registry = NodeRegistry::new();
        registry.register_inferred(&reference("db1.sales_view"), NodeKind::View);
        assert!(registry.get("sales_view").unwrap().inferred);

        registry.register(&reference("db1.sales_view"), NodeKind::Table, Some("CREATE TABLE".into()));

        let node = registry.get("sales_view").unwrap();
        assert_eq!(node.kind, NodeKind::Table);
        assert!(!node.inferred);
    }

    #[test]
    fn test_inferred_registration_keeps_known_kind() {
        let mut registry = NodeRegistry::new();
        registry.register(&reference("db1.m"), NodeKind::MaterializedView, Some("sql".into()));
        registry.register_inferred(&reference("m"), NodeKind::Table);

        let node = registry.get("m").unwrap();
        assert_eq!(node.kind, NodeKind::MaterializedView);
        assert!(!node.inferred);
    }

    #[test]
    fn test_iteration_is_sorted() {
        let mut registry = NodeRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(&reference(name), NodeKind::Table, None);
        }
        let names: Vec<&String> = registry.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.len(), 3);
    }
}
