//! Identifier newtypes, the record layout shared by every index and the
//! crate-wide error type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an RDF term as allocated by a node table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Reserved identifier that no node table allocates.
    ///
    /// Pattern constants that could not be resolved are mapped to it so the
    /// owning pattern reports an empty result instead of failing.
    pub const MISSING: NodeId = NodeId(u64::MAX);

    /// Smallest identifier, used to build minimal keys under a prefix.
    pub const MIN: NodeId = NodeId(0);
}

/// Handle of a page stored in a [`crate::primitives::pager::PageArena`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PageId(pub u32);

/// A three column index key. Column order depends on the permutation of
/// the index that stores it.
pub type Record = [NodeId; 3];

/// Number of key columns of a [`Record`].
pub const RECORD_COLUMNS: usize = 3;

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

impl From<NodeId> for u64 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

/// Errors surfaced by the storage layer and the join core.
#[derive(thiserror::Error, Debug)]
pub enum TrieJoinError {
    /// Underlying I/O failure (CLI and loaders only).
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Broken storage invariant, e.g. touching a page that is not pinned.
    #[error("corruption: {0}")]
    Corruption(&'static str),
    /// Caller supplied an argument the core cannot use.
    #[error("invalid argument: {0}")]
    Invalid(String),
    /// The query shape is outside what the join core evaluates.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
    /// An OPTIONAL child produced more rows than its cache may hold.
    #[error("optional extension cache overflow (capacity {capacity})")]
    CacheOverflow {
        /// Configured cache capacity.
        capacity: usize,
    },
    /// The consumer raised the cancellation flag.
    #[error("query cancelled")]
    Cancelled,
    /// Configuration could not be loaded or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TrieJoinError>;
