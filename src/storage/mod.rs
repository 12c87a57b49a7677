//! Storage collaborators of the join core: the bulk-loaded B+ tree, the
//! six permutation indexes and the node table.

/// B+ tree over three-column records.
pub mod btree;

mod dict;
mod index;
mod options;

pub use dict::{Dictionary, NodeTable};
pub use index::{Permutation, TripleStore, TripleStoreBuilder};
pub use options::StoreOptions;
