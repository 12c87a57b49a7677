use serde::Deserialize;

use crate::types::{Result, TrieJoinError};

/// Layout knobs used when bulk-loading the permutation indexes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreOptions {
    /// Maximum number of records stored in one leaf page
    pub leaf_capacity: usize,
    /// Maximum number of children of one internal page
    pub internal_fanout: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            leaf_capacity: 256,
            internal_fanout: 128,
        }
    }
}

impl StoreOptions {
    /// Sets the leaf page capacity.
    pub fn leaf_capacity(mut self, records: usize) -> Self {
        self.leaf_capacity = records;
        self
    }

    /// Sets the internal page fan-out.
    pub fn internal_fanout(mut self, children: usize) -> Self {
        self.internal_fanout = children;
        self
    }

    /// Rejects layouts the bulk loader cannot build.
    pub fn validate(&self) -> Result<()> {
        if self.leaf_capacity == 0 {
            return Err(TrieJoinError::Config(
                "leaf_capacity must be at least 1".into(),
            ));
        }
        if self.internal_fanout < 2 {
            return Err(TrieJoinError::Config(
                "internal_fanout must be at least 2".into(),
            ));
        }
        Ok(())
    }
}
