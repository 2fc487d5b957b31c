//! Table and dependency extraction utilities for SQL

use sqlparser::ast::{Cte, Query, TableFactor, Visit, Visitor};
use std::collections::HashSet;
use std::ops::ControlFlow;

use super::nodes::ObjectRef;

/// CTE names declared by one statement's `WITH` clause, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CteScope {
    names: Vec<String>,
}

impl CteScope {
    pub fn new() -> Self {
        Self { names: Vec::new() }
    }

    /// Add a name; returns false if it was already declared.
    pub fn declare(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// CTEs declared directly on a query, in document order.
pub fn query_ctes(query: &Query) -> &[Cte] {
    query
        .with
        .as_ref()
        .map(|with| with.cte_tables.as_slice())
        .unwrap_or(&[])
}

/// Base name of a CTE alias
pub fn cte_name(cte: &Cte) -> Option<String> {
    ObjectRef::bare(&cte.alias.name.value).map(|r| r.base)
}

/// Find every object a fragment reads from.
///
/// Walks the whole fragment: joins, derived tables, set operations and
/// subqueries inside expressions (`EXISTS`, `IN`, scalar). Names bound by a
/// `WITH` clause nested inside the fragment are local to it and left out.
/// Unqualified references to a name in `visible_ctes` come back as bare
/// references so the caller can link them to the CTE.
///
/// The result is deduplicated and in first-occurrence order.
pub fn find_dependencies<V: Visit>(fragment: &V, visible_ctes: &CteScope) -> Vec<ObjectRef> {
    let mut collector = DependencyCollector::new(visible_ctes);
    let _ = fragment.visit(&mut collector);
    collector.dependencies
}

/// Dependencies of a query's main body, leaving its own WITH clause out.
///
/// The CTE names of that clause are expected in `visible_ctes`.
pub fn find_body_dependencies(query: &Query, visible_ctes: &CteScope) -> Vec<ObjectRef> {
    let mut collector = DependencyCollector::new(visible_ctes);
    let _ = query.body.visit(&mut collector);
    let _ = query.order_by.visit(&mut collector);
    let _ = query.limit.visit(&mut collector);
    let _ = query.limit_by.visit(&mut collector);
    let _ = query.offset.visit(&mut collector);
    let _ = query.fetch.visit(&mut collector);
    collector.dependencies
}

struct DependencyCollector<'a> {
    visible_ctes: &'a CteScope,
    nested_scopes: Vec<Vec<String>>,
    seen: HashSet<String>,
    dependencies: Vec<ObjectRef>,
}

impl<'a> DependencyCollector<'a> {
    fn new(visible_ctes: &'a CteScope) -> Self {
        Self {
            visible_ctes,
            nested_scopes: Vec::new(),
            seen: HashSet::new(),
            dependencies: Vec::new(),
        }
    }

    fn is_locally_bound(&self, name: &str) -> bool {
        self.nested_scopes
            .iter()
            .any(|scope| scope.iter().any(|n| n == name))
    }

    fn record(&mut self, reference: ObjectRef) {
        if self.seen.insert(reference.full_name.clone()) {
            self.dependencies.push(reference);
        }
    }
}

impl Visitor for DependencyCollector<'_> {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        let scope = query_ctes(query).iter().filter_map(cte_name).collect();
        self.nested_scopes.push(scope);
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.nested_scopes.pop();
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<Self::Break> {
        // `args` is set for table-valued function calls such as generate_series(...)
        if let TableFactor::Table {
            name, args: None, ..
        } = table_factor
        {
            if let Some(reference) = ObjectRef::from_object_name(name) {
                let unqualified = name.0.len() == 1;
                if unqualified && self.is_locally_bound(&reference.base) {
                    return ControlFlow::Continue(());
                }
                if unqualified && self.visible_ctes.contains(&reference.base) {
                    if let Some(cte_ref) = ObjectRef::bare(&reference.base) {
                        self.record(cte_ref);
                    }
                    return ControlFlow::Continue(());
                }
                self.record(reference);
            }
        }
        ControlFlow::Continue(())
    }
}
