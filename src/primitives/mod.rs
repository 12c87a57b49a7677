//! Low-level primitives shared by the storage layer.

/// Page arena with explicit pin counts.
///
/// Every index page lives in an arena and is only readable while pinned.
pub mod pager;
