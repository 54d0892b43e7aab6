//! Node Registry Module
//!
//! The registry maps every discovered address to its [`NodeRecord`]. It is
//! persisted as a flat JSON collection, loaded whole and rewritten whole.
//! Records are never removed by the crawler; an address that stops answering
//! keeps its last known fields.

pub mod enrichment;
mod storage;

pub use storage::{schema_is_current, RegistryFile, StoreError};

use std::collections::{BTreeMap, HashSet};

use crate::types::{NodeRecord, NodeType};

/// Summary of the registry contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Total nodes in registry
    pub total_nodes: usize,

    /// Nodes that answered with neighbors on their last probe
    pub public_nodes: usize,

    /// Nodes that did not
    pub private_nodes: usize,

    /// Nodes with a resolved (non-sentinel) location
    pub located_nodes: usize,

    /// Number of distinct countries among located nodes
    pub unique_countries: usize,
}

/// In-memory registry keyed by address
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, NodeRecord>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a record list; a later duplicate address wins
    pub fn from_records(records: Vec<NodeRecord>) -> Self {
        let mut registry = Self::new();
        for record in records {
            registry.upsert(record);
        }
        registry
    }

    /// Insert or replace the record for its address
    pub fn upsert(&mut self, record: NodeRecord) {
        self.nodes.insert(record.address.clone(), record);
    }

    pub fn get(&self, address: &str) -> Option<&NodeRecord> {
        self.nodes.get(address)
    }

    pub fn get_mut(&mut self, address: &str) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(address)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All known addresses, sorted
    pub fn addresses(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        let public_nodes = self
            .records()
            .filter(|r| r.node_type == NodeType::Public)
            .count();

        let located: Vec<_> = self
            .records()
            .filter_map(|r| r.location.as_ref())
            .filter(|l| l.is_resolved())
            .collect();

        let unique_countries = located
            .iter()
            .map(|l| l.country.as_str())
            .collect::<HashSet<_>>()
            .len();

        RegistryStats {
            total_nodes: self.nodes.len(),
            public_nodes,
            private_nodes: self.nodes.len() - public_nodes,
            located_nodes: located.len(),
            unique_countries,
        }
    }
}
