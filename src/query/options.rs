use serde::Deserialize;

use crate::types::{Result, TrieJoinError};

/// What an OPTIONAL child does once its cache is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOverflow {
    /// Keep collecting past the preallocated capacity and warn once.
    #[default]
    Grow,
    /// Fail the query with [`TrieJoinError::CacheOverflow`].
    Error,
}

/// Tunables of the join core.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JoinOptions {
    /// Records fetched per no-intersection buffer block
    pub buffer_block: usize,
    /// Preallocated rows per OPTIONAL child cache
    pub optional_cache_capacity: usize,
    /// Behavior once an OPTIONAL cache is full
    pub cache_overflow: CacheOverflow,
    /// Enumerate buffered suffixes in variable order instead of cheapest first
    pub ordered_enumeration: bool,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            buffer_block: 1_000,
            optional_cache_capacity: 1_000,
            cache_overflow: CacheOverflow::Grow,
            ordered_enumeration: false,
        }
    }
}

impl JoinOptions {
    /// Sets the buffer block size.
    pub fn buffer_block(mut self, records: usize) -> Self {
        self.buffer_block = records;
        self
    }

    /// Sets the OPTIONAL cache capacity.
    pub fn optional_cache_capacity(mut self, rows: usize) -> Self {
        self.optional_cache_capacity = rows;
        self
    }

    /// Sets the cache overflow policy.
    pub fn cache_overflow(mut self, policy: CacheOverflow) -> Self {
        self.cache_overflow = policy;
        self
    }

    /// Enables lexicographic enumeration of buffered suffixes.
    pub fn ordered_enumeration(mut self, enabled: bool) -> Self {
        self.ordered_enumeration = enabled;
        self
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_block == 0 {
            return Err(TrieJoinError::Config("buffer_block must be at least 1".into()));
        }
        Ok(())
    }
}
