use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::Serialize;

use super::ast::Var;
use crate::types::NodeId;

/// Variable to node identifier mapping produced by the join core.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Binding {
    nodes: BTreeMap<Var, NodeId>,
}

impl Binding {
    /// Creates an empty binding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value bound to `var`, if any.
    pub fn get(&self, var: &str) -> Option<NodeId> {
        self.nodes.get(var).copied()
    }

    /// Returns `true` when `var` has a value.
    pub fn contains(&self, var: &str) -> bool {
        self.nodes.contains_key(var)
    }

    /// Binds `var` to `node`, replacing any previous value.
    pub fn insert(&mut self, var: Var, node: NodeId) {
        self.nodes.insert(var, node);
    }

    /// Copies every variable of `other` that is not bound here yet.
    pub fn extend_missing(&mut self, other: &Binding) {
        for (var, node) in &other.nodes {
            if !self.nodes.contains_key(var) {
                self.nodes.insert(var.clone(), *node);
            }
        }
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over `(variable, value)` pairs in variable order.
    pub fn iter(&self) -> btree_map::Iter<'_, Var, NodeId> {
        self.nodes.iter()
    }
}

impl FromIterator<(Var, NodeId)> for Binding {
    fn from_iter<I: IntoIterator<Item = (Var, NodeId)>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Binding {
    type Item = (&'a Var, &'a NodeId);
    type IntoIter = btree_map::Iter<'a, Var, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
