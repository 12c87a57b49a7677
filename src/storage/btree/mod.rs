#![forbid(unsafe_code)]

//! Bulk-loaded B+ tree over three-column records.

/// B+ tree page layout.
pub mod page;

mod cursor;
mod stats;
mod tree;

pub use cursor::RangeScan;
pub use stats::{BTreeStats, BTreeStatsSnapshot};
pub use tree::TripleTree;
pub(crate) use tree::{bulk_load, Path};
