#![forbid(unsafe_code)]

//! Join core: trie cursors, the leapfrog engine and the OPTIONAL/FILTER
//! plan tree, plus the streaming executor on top of them.

/// Operator tree, patterns and filter expressions.
pub mod ast;

/// Streaming execution of plans.
///
/// Wraps the root plan node with cancellation and term conversion.
pub mod executor;

/// Multiway leapfrog join over one basic graph pattern.
pub mod leapfrog;

/// OPTIONAL and FILTER composition.
pub mod plan;

/// Leveled cursor over one permutation index.
pub mod trie;

mod binding;
mod filter;
mod options;
mod order;
mod stats;

pub use ast::{FilterExpr, PlanOp, Term, TriplePattern, Var};
pub use binding::Binding;
pub use executor::{Executor, ResultStream};
pub use filter::FilterPredicate;
pub use leapfrog::JoinEngine;
pub use options::{CacheOverflow, JoinOptions};
pub use plan::{PlanNode, Stage};
pub use stats::{JoinStats, JoinStatsSnapshot};
pub use trie::TrieCursor;
