//! Inheritance graph - derived-to-base edges between registered records.
//!
//! Uses `petgraph::DiGraph` with:
//! - Nodes: [`RecordKey`] (native identity plus load unit)
//! - Edges: base position in the derived class's declaration

use std::any::TypeId;

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use bindery_core::{LoadUnit, RegistrationError, TypeRecord};

/// Identity of a registered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub type_id: TypeId,
    pub unit: Option<LoadUnit>,
}

impl RecordKey {
    pub fn of(record: &TypeRecord) -> Self {
        Self {
            type_id: record.type_id,
            unit: record.unit,
        }
    }
}

#[derive(Debug, Default)]
pub struct InheritanceGraph {
    graph: DiGraph<RecordKey, usize>,
    nodes: FxHashMap<RecordKey, NodeIndex>,
}

impl InheritanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, key: RecordKey) -> NodeIndex {
        if let Some(&index) = self.nodes.get(&key) {
            return index;
        }
        let index = self.graph.add_node(key);
        self.nodes.insert(key, index);
        index
    }

    /// Add `derived -> base` edges for every base of `record`.
    ///
    /// Rejects the record (leaving the graph unchanged) if the edges would
    /// close a cycle.
    pub fn insert(&mut self, record: &TypeRecord) -> Result<(), RegistrationError> {
        let derived_key = RecordKey::of(record);
        let derived = self.node(derived_key);
        let mut added = Vec::with_capacity(record.bases.len());
        for (position, link) in record.bases.iter().enumerate() {
            let base = self.node(RecordKey::of(&link.record));
            added.push(self.graph.add_edge(derived, base, position));
        }

        if is_cyclic_directed(&self.graph) {
            // edge indices shift on removal, so remove newest first
            for edge in added.into_iter().rev() {
                self.graph.remove_edge(edge);
            }
            return Err(RegistrationError::CircularInheritance(record.name.clone()));
        }
        Ok(())
    }

    /// Check if `derived` is `base` or inherits from it.
    pub fn is_subclass(&self, derived: RecordKey, base: RecordKey) -> bool {
        match (self.nodes.get(&derived), self.nodes.get(&base)) {
            (Some(&d), Some(&b)) => has_path_connecting(&self.graph, d, b, None),
            _ => derived == base,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
