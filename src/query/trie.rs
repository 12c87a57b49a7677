//! Leveled trie navigation over one permutation index.

use std::ops::Bound;
use std::sync::Arc;

use smallvec::SmallVec;

use super::stats::JoinStats;
use crate::storage::btree::{Path, RangeScan, TripleTree};
use crate::storage::Permutation;
use crate::types::{NodeId, Record, Result, TrieJoinError, RECORD_COLUMNS};

/// Presents a permutation-ordered [`TripleTree`] as a three level trie.
///
/// Level `l` of the trie is key column `l`. The cursor keeps the pages of
/// its current root-to-leaf path pinned; moving to a key outside the
/// current leaf pops frames until an ancestor covers the key and descends
/// again, and the old leaf is released only once the new one is pinned.
///
/// Columns at and after `no_intersection_level` are never navigated level
/// by level. They are enumerated from buffered blocks of records sharing
/// the bound prefix, each row writing its suffix columns into the engine
/// binding at `suffix_levels`.
pub struct TrieCursor {
    tree: TripleTree,
    permutation: Permutation,
    path: Path,
    slot: usize,
    level: isize,
    prefix: Record,
    at_end: bool,
    no_intersection_level: usize,
    suffix_levels: SmallVec<[usize; RECORD_COLUMNS]>,
    buffer: SuffixBuffer,
    stats: Arc<JoinStats>,
}

struct SuffixBuffer {
    block_size: usize,
    lower: Bound<Record>,
    upper: Bound<Record>,
    scan: Option<RangeScan>,
    block: Vec<Record>,
    pos: usize,
    blocks_read: usize,
}

impl TrieCursor {
    pub(crate) fn new(
        tree: TripleTree,
        permutation: Permutation,
        no_intersection_level: usize,
        suffix_levels: SmallVec<[usize; RECORD_COLUMNS]>,
        block_size: usize,
        stats: Arc<JoinStats>,
    ) -> Self {
        Self {
            tree,
            permutation,
            path: Path::new(),
            slot: 0,
            level: -1,
            prefix: [NodeId::MIN; RECORD_COLUMNS],
            at_end: false,
            no_intersection_level,
            suffix_levels,
            buffer: SuffixBuffer {
                block_size: block_size.max(1),
                lower: Bound::Unbounded,
                upper: Bound::Unbounded,
                scan: None,
                block: Vec::new(),
                pos: 0,
                blocks_read: 0,
            },
            stats,
        }
    }

    /// Column order of the underlying index.
    pub fn permutation(&self) -> Permutation {
        self.permutation
    }

    /// Number of leading columns that are navigated level by level.
    pub fn no_intersection_level(&self) -> usize {
        self.no_intersection_level
    }

    /// Current trie level, `-1` before the first `open`.
    pub fn level(&self) -> isize {
        self.level
    }

    /// Smallest engine level written by the buffered suffix.
    pub fn first_suffix_level(&self) -> Option<usize> {
        self.suffix_levels.first().copied()
    }

    /// Key of the current level.
    pub fn key(&self) -> NodeId {
        self.prefix[self.level.max(0) as usize]
    }

    /// Returns `true` once the last move left the bound prefix.
    pub fn at_end(&self) -> bool {
        self.at_end
    }

    /// Descends one level and positions at the first record under the
    /// bound prefix.
    pub fn open(&mut self) -> Result<()> {
        if self.level + 1 >= RECORD_COLUMNS as isize {
            return Err(TrieJoinError::Invalid(format!(
                "open below the last column of {}",
                self.permutation
            )));
        }
        self.stats.inc_opens();
        self.level += 1;
        let target = self.target(NodeId::MIN);
        let found = self.locate(target)?;
        self.settle(found);
        Ok(())
    }

    /// Ascends one level. The position is left untouched.
    pub fn up(&mut self) -> Result<()> {
        if self.level < 0 {
            return Err(TrieJoinError::Invalid("up above the trie root".into()));
        }
        self.level -= 1;
        self.at_end = false;
        Ok(())
    }

    /// Moves to the next distinct key of this level under the bound prefix.
    pub fn next(&mut self) -> Result<()> {
        if self.at_end {
            return Ok(());
        }
        self.stats.inc_nexts();
        let key = self.key();
        if key.0 == u64::MAX {
            self.at_end = true;
            return Ok(());
        }
        let target = self.target(NodeId(key.0 + 1));
        let found = self.locate(target)?;
        self.settle(found);
        Ok(())
    }

    /// Moves to the first key `>= key` of this level under the bound
    /// prefix. A key not greater than the current one behaves as `next`.
    pub fn seek(&mut self, key: NodeId) -> Result<()> {
        if self.at_end {
            return Ok(());
        }
        if key <= self.key() {
            return self.next();
        }
        self.stats.inc_seeks();
        let target = self.target(key);
        let found = self.locate(target)?;
        self.settle(found);
        Ok(())
    }

    /// Materializes the first block of records sharing the first
    /// `no_intersection_level` columns of the current prefix.
    pub fn start_no_intersection(&mut self) -> Result<()> {
        let nil = self.no_intersection_level;
        if nil == 0 {
            self.buffer.lower = Bound::Unbounded;
            self.buffer.upper = Bound::Unbounded;
        } else {
            let mut lower = [NodeId::MIN; RECORD_COLUMNS];
            let mut upper = [NodeId::MISSING; RECORD_COLUMNS];
            lower[..nil].copy_from_slice(&self.prefix[..nil]);
            upper[..nil].copy_from_slice(&self.prefix[..nil]);
            self.buffer.lower = Bound::Included(lower);
            self.buffer.upper = Bound::Included(upper);
        }
        self.restart_scan()
    }

    /// Drops the buffered block and its scan.
    pub fn end_no_intersection(&mut self) {
        self.buffer.scan = None;
        self.buffer.block.clear();
        self.buffer.pos = 0;
        self.buffer.blocks_read = 0;
    }

    /// Number of records in the current block.
    pub fn buffer_size(&self) -> usize {
        self.buffer.block.len()
    }

    /// Returns `true` if the current block has a row after the current one.
    pub fn has_next_in_buffer(&self) -> bool {
        self.buffer.pos + 1 < self.buffer.block.len()
    }

    /// Steps to the next row of the current block.
    pub fn next_in_buffer(&mut self, binding: &mut [NodeId]) {
        self.buffer.pos += 1;
        self.write_current(binding);
    }

    /// Rewinds to the first row of the current block.
    pub fn reset_buffer(&mut self, binding: &mut [NodeId]) {
        self.buffer.pos = 0;
        self.write_current(binding);
    }

    /// Returns `true` if the scan has records past the current block.
    pub fn has_next_buffer(&mut self) -> Result<bool> {
        match self.buffer.scan.as_mut() {
            Some(scan) => Ok(scan.peek()?.is_some()),
            None => Ok(false),
        }
    }

    /// Replaces the current block with the next one from the scan.
    pub fn next_buffer(&mut self, binding: &mut [NodeId]) -> Result<()> {
        self.fill_block()?;
        self.write_current(binding);
        Ok(())
    }

    /// Rewinds to the first row of the first block.
    pub fn reset_all(&mut self, binding: &mut [NodeId]) -> Result<()> {
        if self.buffer.blocks_read > 1 {
            self.restart_scan()?;
        }
        self.reset_buffer(binding);
        Ok(())
    }

    /// Writes the suffix columns of the current row into `binding`.
    pub fn write_current(&self, binding: &mut [NodeId]) {
        let Some(record) = self.buffer.block.get(self.buffer.pos) else {
            return;
        };
        let nil = self.no_intersection_level;
        for (offset, &level) in self.suffix_levels.iter().enumerate() {
            if let Some(slot) = binding.get_mut(level) {
                *slot = record[nil + offset];
            }
        }
    }

    fn restart_scan(&mut self) -> Result<()> {
        self.buffer.scan = None;
        let scan = self
            .tree
            .range(self.buffer.lower, self.buffer.upper)?;
        self.buffer.scan = Some(scan);
        self.buffer.blocks_read = 0;
        self.fill_block()
    }

    fn fill_block(&mut self) -> Result<()> {
        let buffer = &mut self.buffer;
        buffer.block.clear();
        buffer.pos = 0;
        if let Some(scan) = buffer.scan.as_mut() {
            while buffer.block.len() < buffer.block_size {
                match scan.next()? {
                    Some(record) => buffer.block.push(record),
                    None => break,
                }
            }
        }
        buffer.blocks_read += 1;
        self.stats.inc_buffer_blocks();
        tracing::trace!(
            target: "triejoin::join::buffer",
            permutation = %self.permutation,
            block = self.buffer.blocks_read,
            rows = self.buffer.block.len(),
            "filled suffix block"
        );
        Ok(())
    }

    /// Smallest key at the current level that starts with the bound prefix
    /// and has `key` in the current column.
    fn target(&self, key: NodeId) -> Record {
        let level = self.level.max(0) as usize;
        let mut target = [NodeId::MIN; RECORD_COLUMNS];
        target[..level].copy_from_slice(&self.prefix[..level]);
        target[level] = key;
        target
    }

    fn settle(&mut self, found: Option<Record>) {
        let level = self.level.max(0) as usize;
        match found {
            Some(record) if record[..level] == self.prefix[..level] => {
                self.prefix[level] = record[level];
                self.at_end = false;
            }
            _ => self.at_end = true,
        }
    }

    /// Positions at the first record `>= target`.
    fn locate(&mut self, mut target: Record) -> Result<Option<Record>> {
        loop {
            let covered = self
                .path
                .last()
                .is_some_and(|frame| frame.fences.covers(&target));
            if !covered {
                self.relocate(&target)?;
            }
            let frame = *self
                .path
                .last()
                .ok_or(TrieJoinError::Corruption("cursor path lost its leaf"))?;
            let leaf = self.tree.leaf(frame.page)?;
            let len = leaf.records.len();
            let start = if covered
                && self.slot <= len
                && (self.slot == 0 || leaf.records[self.slot - 1] < target)
            {
                self.slot
            } else {
                0
            };
            let slot = leaf.gallop_from(start, &target);
            if slot < len {
                self.slot = slot;
                return Ok(Some(leaf.records[slot]));
            }
            match frame.fences.upper {
                Some(upper) => target = upper,
                None => {
                    self.slot = len;
                    return Ok(None);
                }
            }
        }
    }

    /// Re-descends to the leaf covering `target`.
    fn relocate(&mut self, target: &Record) -> Result<()> {
        let old_leaf = self.path.pop();
        while let Some(frame) = self.path.last().copied() {
            if frame.fences.covers(target) {
                break;
            }
            self.path.pop();
            self.tree.unpin(frame.page)?;
        }
        if self.path.is_empty() {
            self.tree.push_root(&mut self.path)?;
        }
        self.tree.descend(&mut self.path, target)?;
        if let Some(old) = old_leaf {
            self.tree.unpin(old.page)?;
        }
        self.slot = 0;
        Ok(())
    }
}

impl Drop for TrieCursor {
    fn drop(&mut self) {
        self.buffer.scan = None;
        if let Err(err) = self.tree.release_path(&mut self.path) {
            tracing::warn!(
                permutation = %self.permutation,
                error = %err,
                "trie_cursor.drop.release_failed"
            );
        }
    }
}
