use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::{PageId, Result, TrieJoinError};

/// Fixed set of immutable pages addressed by [`PageId`].
///
/// Pages are appended while an index is being built and never change
/// afterwards. Readers must `pin` a page before touching it and `unpin`
/// it once they will not visit it again; the pin count is the only
/// reference bookkeeping, so a page read while unpinned is reported as
/// corruption instead of silently succeeding.
pub struct PageArena<P> {
    pages: Vec<P>,
    pins: Vec<AtomicU32>,
}

impl<P> Default for PageArena<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> PageArena<P> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            pins: Vec::new(),
        }
    }

    /// Appends `page` and returns its handle.
    pub fn allocate(&mut self, page: P) -> Result<PageId> {
        let id = u32::try_from(self.pages.len())
            .map_err(|_| TrieJoinError::Invalid("page arena exhausted".into()))?;
        self.pages.push(page);
        self.pins.push(AtomicU32::new(0));
        Ok(PageId(id))
    }

    /// Number of pages stored in the arena.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns `true` when no page was ever allocated.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Takes one reference on `id`.
    pub fn pin(&self, id: PageId) -> Result<()> {
        let slot = self
            .pins
            .get(id.0 as usize)
            .ok_or(TrieJoinError::Corruption("pin of unknown page"))?;
        slot.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Drops one reference on `id`.
    pub fn unpin(&self, id: PageId) -> Result<()> {
        let slot = self
            .pins
            .get(id.0 as usize)
            .ok_or(TrieJoinError::Corruption("unpin of unknown page"))?;
        slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
            count.checked_sub(1)
        })
        .map(|_| ())
        .map_err(|_| TrieJoinError::Corruption("unpin of unpinned page"))
    }

    /// Borrows a pinned page.
    pub fn page(&self, id: PageId) -> Result<&P> {
        if self.pin_count(id) == 0 {
            return Err(TrieJoinError::Corruption("access to unpinned page"));
        }
        self.pages
            .get(id.0 as usize)
            .ok_or(TrieJoinError::Corruption("access to unknown page"))
    }

    /// Current pin count of `id` (zero for unknown pages).
    pub fn pin_count(&self, id: PageId) -> u32 {
        self.pins
            .get(id.0 as usize)
            .map_or(0, |slot| slot.load(Ordering::Acquire))
    }

    /// Number of pages that currently hold at least one pin.
    pub fn pinned_pages(&self) -> usize {
        self.pins
            .iter()
            .filter(|slot| slot.load(Ordering::Acquire) > 0)
            .count()
    }
}
