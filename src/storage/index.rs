//! Six permutation indexes over one page arena.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::btree::page::Page;
use super::btree::{bulk_load, BTreeStats, BTreeStatsSnapshot, TripleTree};
use super::options::StoreOptions;
use crate::primitives::pager::PageArena;
use crate::types::{NodeId, Record, Result};

/// Column order of one physical index.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permutation {
    /// subject, predicate, object
    Spo,
    /// predicate, object, subject
    Pos,
    /// object, subject, predicate
    Osp,
    /// subject, object, predicate
    Sop,
    /// predicate, subject, object
    Pso,
    /// object, predicate, subject
    Ops,
}

impl Permutation {
    /// Every permutation, in storage order.
    pub const ALL: [Permutation; 6] = [
        Permutation::Spo,
        Permutation::Pos,
        Permutation::Osp,
        Permutation::Sop,
        Permutation::Pso,
        Permutation::Ops,
    ];

    /// Triple positions (0 = subject, 1 = predicate, 2 = object) stored
    /// at key columns 0, 1 and 2.
    pub const fn columns(self) -> [usize; 3] {
        match self {
            Permutation::Spo => [0, 1, 2],
            Permutation::Pos => [1, 2, 0],
            Permutation::Osp => [2, 0, 1],
            Permutation::Sop => [0, 2, 1],
            Permutation::Pso => [1, 0, 2],
            Permutation::Ops => [2, 1, 0],
        }
    }

    /// Inverse of [`Permutation::columns`].
    pub fn from_columns(columns: [usize; 3]) -> Option<Permutation> {
        Self::ALL.into_iter().find(|perm| perm.columns() == columns)
    }

    /// Reorders a `(s, p, o)` triple into this permutation's key.
    pub fn project(self, triple: [NodeId; 3]) -> Record {
        let cols = self.columns();
        [triple[cols[0]], triple[cols[1]], triple[cols[2]]]
    }

    /// Restores the `(s, p, o)` triple from a key of this permutation.
    pub fn unproject(self, record: Record) -> [NodeId; 3] {
        let cols = self.columns();
        let mut triple = [NodeId::MIN; 3];
        for (column, position) in cols.into_iter().enumerate() {
            triple[position] = record[column];
        }
        triple
    }

    fn slot(self) -> usize {
        match self {
            Permutation::Spo => 0,
            Permutation::Pos => 1,
            Permutation::Osp => 2,
            Permutation::Sop => 3,
            Permutation::Pso => 4,
            Permutation::Ops => 5,
        }
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permutation::Spo => "SPO",
            Permutation::Pos => "POS",
            Permutation::Osp => "OSP",
            Permutation::Sop => "SOP",
            Permutation::Pso => "PSO",
            Permutation::Ops => "OPS",
        };
        f.write_str(name)
    }
}

/// Collects triples and bulk-loads them into a [`TripleStore`].
#[derive(Debug, Default)]
pub struct TripleStoreBuilder {
    options: StoreOptions,
    triples: Vec<[NodeId; 3]>,
}

impl TripleStoreBuilder {
    /// Creates a builder with the given page layout.
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            triples: Vec::new(),
        }
    }

    /// Queues one triple; duplicates are dropped at build time.
    pub fn insert(&mut self, s: NodeId, p: NodeId, o: NodeId) -> &mut Self {
        self.triples.push([s, p, o]);
        self
    }

    /// Queues every triple of `triples`.
    pub fn extend<I>(&mut self, triples: I) -> &mut Self
    where
        I: IntoIterator<Item = [NodeId; 3]>,
    {
        self.triples.extend(triples);
        self
    }

    /// Builds all six permutation trees.
    pub fn build(self) -> Result<TripleStore> {
        self.options.validate()?;
        let mut arena = PageArena::<Page>::new();
        let mut shapes = Vec::with_capacity(Permutation::ALL.len());
        for perm in Permutation::ALL {
            let records: Vec<Record> = self
                .triples
                .iter()
                .map(|triple| perm.project(*triple))
                .collect();
            shapes.push(bulk_load(&mut arena, records, &self.options)?);
        }
        let arena = Arc::new(arena);
        let stats = Arc::new(BTreeStats::default());
        let trees = shapes
            .into_iter()
            .map(|shape| TripleTree::new(Arc::clone(&arena), shape, Arc::clone(&stats)))
            .collect::<Vec<_>>();
        let len = trees.first().map_or(0, TripleTree::len);
        tracing::info!(
            triples = len,
            pages = arena.len(),
            leaf_capacity = self.options.leaf_capacity,
            internal_fanout = self.options.internal_fanout,
            "store.build.done"
        );
        Ok(TripleStore {
            arena,
            trees,
            stats,
            len,
        })
    }
}

/// Immutable triple store holding one [`TripleTree`] per permutation.
pub struct TripleStore {
    arena: Arc<PageArena<Page>>,
    trees: Vec<TripleTree>,
    stats: Arc<BTreeStats>,
    len: usize,
}

impl TripleStore {
    /// Starts a new builder with default layout options.
    pub fn builder() -> TripleStoreBuilder {
        TripleStoreBuilder::default()
    }

    /// Returns the tree sorted in `permutation` order.
    pub fn index(&self, permutation: Permutation) -> &TripleTree {
        &self.trees[permutation.slot()]
    }

    /// Number of distinct triples.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the store holds no triple.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of pages currently pinned by any reader.
    pub fn pinned_pages(&self) -> usize {
        self.arena.pinned_pages()
    }

    /// Shared B+ tree counters of every index.
    pub fn btree_stats(&self) -> BTreeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Emits the B+ tree counters through `tracing`.
    pub fn emit_tracing(&self) {
        self.stats.emit_tracing();
    }
}

impl fmt::Debug for TripleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripleStore")
            .field("triples", &self.len)
            .field("pages", &self.arena.len())
            .finish()
    }
}
