//! In-memory page layout of the triple B+ tree.

use crate::types::{PageId, Record};

/// A B+ tree page.
#[derive(Clone, Debug)]
pub enum Page {
    /// Routing page.
    Internal(InternalPage),
    /// Record page.
    Leaf(LeafPage),
}

/// Routing page: `separators[i]` is the smallest key stored under
/// `children[i + 1]`, so `separators.len() + 1 == children.len()`.
#[derive(Clone, Debug, Default)]
pub struct InternalPage {
    /// Separator keys, ascending.
    pub separators: Vec<Record>,
    /// Child page handles.
    pub children: Vec<PageId>,
}

/// Record page holding sorted, unique keys.
#[derive(Clone, Debug, Default)]
pub struct LeafPage {
    /// Keys stored in this leaf, ascending.
    pub records: Vec<Record>,
    /// Next leaf in key order.
    pub right_sibling: Option<PageId>,
}

/// Half-open key range `[lower, upper)` covered by a subtree. `None`
/// stands for the corresponding infinity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fences {
    /// Inclusive lower fence.
    pub lower: Option<Record>,
    /// Exclusive upper fence.
    pub upper: Option<Record>,
}

impl Fences {
    /// Fences of the root page.
    pub const UNBOUNDED: Fences = Fences {
        lower: None,
        upper: None,
    };

    /// Returns `true` if `key` falls inside the fences.
    pub fn covers(&self, key: &Record) -> bool {
        let above_lower = self.lower.as_ref().map_or(true, |lower| lower <= key);
        let below_upper = self.upper.as_ref().map_or(true, |upper| key < upper);
        above_lower && below_upper
    }
}

impl InternalPage {
    /// Index of the child whose subtree covers `key`.
    pub fn child_index(&self, key: &Record) -> usize {
        self.separators.partition_point(|sep| sep <= key)
    }

    /// Fences of child `idx`, given the fences of this page.
    pub fn child_fences(&self, idx: usize, parent: Fences) -> Fences {
        let lower = if idx == 0 {
            parent.lower
        } else {
            self.separators.get(idx - 1).copied()
        };
        let upper = if idx >= self.separators.len() {
            parent.upper
        } else {
            Some(self.separators[idx])
        };
        Fences { lower, upper }
    }
}

impl LeafPage {
    /// First slot whose key is `>= key`; `records.len()` if none.
    pub fn lower_bound(&self, key: &Record) -> usize {
        self.records.partition_point(|rec| rec < key)
    }

    /// Same as [`LeafPage::lower_bound`] restricted to slots `>= start`,
    /// found by exponential search so short forward moves stay cheap.
    pub fn gallop_from(&self, start: usize, key: &Record) -> usize {
        let len = self.records.len();
        if start >= len || self.records[start] >= *key {
            return start.min(len);
        }
        let mut lo = start;
        let mut step = 1usize;
        let mut hi = start + step;
        while hi < len && self.records[hi] < *key {
            lo = hi;
            step <<= 1;
            hi = lo + step;
        }
        let hi = hi.min(len);
        lo + 1 + self.records[lo + 1..hi].partition_point(|rec| rec < key)
    }
}
