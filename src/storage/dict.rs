use rustc_hash::FxHashMap;

use crate::types::NodeId;

/// Two-way mapping between term strings and node identifiers.
pub trait NodeTable {
    /// Identifier of `term`, if it was ever allocated.
    fn node_id(&self, term: &str) -> Option<NodeId>;

    /// Term behind `id`, if any.
    fn term(&self, id: NodeId) -> Option<&str>;

    /// Identifier of `term`, or [`NodeId::MISSING`] when the table has
    /// never seen it. A pattern constant resolved this way never matches.
    fn resolve(&self, term: &str) -> NodeId {
        self.node_id(term).unwrap_or(NodeId::MISSING)
    }
}

/// In-memory node table. Identifiers are dense and allocated in
/// first-seen order starting at zero.
#[derive(Debug, Default, Clone)]
pub struct Dictionary {
    ids: FxHashMap<String, NodeId>,
    terms: Vec<String>,
}

impl Dictionary {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identifier of `term`, allocating one if needed.
    pub fn intern(&mut self, term: &str) -> NodeId {
        if let Some(id) = self.ids.get(term) {
            return *id;
        }
        let id = NodeId(self.terms.len() as u64);
        self.terms.push(term.to_owned());
        self.ids.insert(term.to_owned(), id);
        id
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns `true` if no term was interned.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl NodeTable for Dictionary {
    fn node_id(&self, term: &str) -> Option<NodeId> {
        self.ids.get(term).copied()
    }

    fn term(&self, id: NodeId) -> Option<&str> {
        usize::try_from(id.0)
            .ok()
            .and_then(|idx| self.terms.get(idx))
            .map(String::as_str)
    }
}
