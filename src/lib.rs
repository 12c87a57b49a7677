//! Worst-case optimal joins over an in-memory triple store.
//!
//! Triples are kept in six sorted permutation indexes, each a paged
//! B-tree. A [`query::TrieCursor`] walks one index as a trie, a
//! [`query::JoinEngine`] intersects cursors level by level with the
//! leapfrog triejoin, and [`query::PlanNode`] composes engines into
//! OPTIONAL and FILTER plans.
//!
//! # Limitations
//!
//! A variable may occur at most once inside a single triple pattern.
//! Patterns such as `(?x p ?x)` are rejected with
//! [`TrieJoinError::UnsupportedFeature`] when the plan is initialized;
//! join the pattern with a fresh variable and an equality filter instead.

#![warn(missing_docs)]

pub mod cli;
pub mod primitives;
pub mod query;
pub mod storage;
pub mod types;

pub use query::{Binding, Executor, PlanOp, ResultStream};
pub use storage::{Dictionary, NodeTable, TripleStore, TripleStoreBuilder};
pub use types::{NodeId, Result, TrieJoinError};
