use std::ops::Bound;

use super::tree::{Path, TripleTree};
use crate::types::{NodeId, PageId, Record, Result, TrieJoinError};

/// Forward scan over a key range of a [`TripleTree`].
///
/// The scan keeps exactly one leaf pinned. When it crosses into the right
/// sibling the sibling is pinned before the current leaf is released.
pub struct RangeScan {
    tree: TripleTree,
    lower: Bound<Record>,
    upper: Bound<Record>,
    current: Option<PageId>,
    slot_index: usize,
    done: bool,
}

impl RangeScan {
    pub(crate) fn new(tree: TripleTree, lower: Bound<Record>, upper: Bound<Record>) -> Result<Self> {
        let done = range_is_empty(&lower, &upper);
        let mut scan = Self {
            tree,
            lower,
            upper,
            current: None,
            slot_index: 0,
            done,
        };
        scan.initialize()?;
        Ok(scan)
    }

    /// Returns the next record without consuming it.
    pub fn peek(&mut self) -> Result<Option<Record>> {
        if !self.settle()? {
            return Ok(None);
        }
        let Some(page) = self.current else {
            return Ok(None);
        };
        let record = self.tree.leaf(page)?.records[self.slot_index];
        if self.is_past_upper(&record) {
            self.finish()?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Advances the scan and returns the next record, if any.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Record>> {
        let record = self.peek()?;
        if record.is_some() {
            self.slot_index += 1;
        }
        Ok(record)
    }

    /// Returns `true` once the scan is exhausted and holds no pin.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn initialize(&mut self) -> Result<()> {
        if self.done {
            return Ok(());
        }
        let target = match &self.lower {
            Bound::Included(key) | Bound::Excluded(key) => *key,
            Bound::Unbounded => [NodeId::MIN; 3],
        };
        let mut path = Path::new();
        self.tree.push_root(&mut path)?;
        self.tree.descend(&mut path, &target)?;
        let leaf = path
            .pop()
            .ok_or(TrieJoinError::Corruption("descent produced empty path"))?;
        self.tree.release_path(&mut path)?;
        self.current = Some(leaf.page);
        let page = self.tree.leaf(leaf.page)?;
        self.slot_index = match &self.lower {
            Bound::Included(key) => page.lower_bound(key),
            Bound::Excluded(key) => page.records.partition_point(|rec| rec <= key),
            Bound::Unbounded => 0,
        };
        Ok(())
    }

    /// Moves past exhausted leaves; returns `false` once nothing is left.
    fn settle(&mut self) -> Result<bool> {
        loop {
            if self.done {
                return Ok(false);
            }
            let Some(page) = self.current else {
                self.finish()?;
                return Ok(false);
            };
            let leaf = self.tree.leaf(page)?;
            if self.slot_index < leaf.records.len() {
                return Ok(true);
            }
            let Some(next) = leaf.right_sibling else {
                self.finish()?;
                return Ok(false);
            };
            self.tree.pin(next)?;
            self.tree.unpin(page)?;
            self.current = Some(next);
            self.slot_index = 0;
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.done = true;
        self.slot_index = 0;
        if let Some(page) = self.current.take() {
            self.tree.unpin(page)?;
        }
        Ok(())
    }

    fn is_past_upper(&self, key: &Record) -> bool {
        match &self.upper {
            Bound::Unbounded => false,
            Bound::Included(bound) => key > bound,
            Bound::Excluded(bound) => key >= bound,
        }
    }
}

impl Drop for RangeScan {
    fn drop(&mut self) {
        if let Some(page) = self.current.take() {
            if let Err(err) = self.tree.unpin(page) {
                tracing::warn!(page = page.0, error = %err, "range_scan.drop.unpin_failed");
            }
        }
    }
}

fn range_is_empty(lower: &Bound<Record>, upper: &Bound<Record>) -> bool {
    let (lo, lo_inclusive) = match lower {
        Bound::Unbounded => return false,
        Bound::Included(key) => (key, true),
        Bound::Excluded(key) => (key, false),
    };
    let (hi, hi_inclusive) = match upper {
        Bound::Unbounded => return false,
        Bound::Included(key) => (key, true),
        Bound::Excluded(key) => (key, false),
    };
    match lo.cmp(hi) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Equal => !(lo_inclusive && hi_inclusive),
        std::cmp::Ordering::Less => false,
    }
}
