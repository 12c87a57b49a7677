use std::ops::Bound;
use std::sync::Arc;

use smallvec::SmallVec;

use super::cursor::RangeScan;
use super::page::{Fences, InternalPage, LeafPage, Page};
use super::stats::{BTreeStats, BTreeStatsSnapshot};
use crate::primitives::pager::PageArena;
use crate::storage::options::StoreOptions;
use crate::types::{PageId, Record, Result, TrieJoinError};

/// One pinned page on a root-to-leaf path together with the key range
/// its subtree covers.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PathFrame {
    pub(crate) page: PageId,
    pub(crate) fences: Fences,
}

/// Root-to-leaf stack of pinned pages.
pub(crate) type Path = SmallVec<[PathFrame; 8]>;

/// Root handle, height and size of a bulk-loaded tree.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TreeShape {
    pub(crate) root: PageId,
    pub(crate) height: u32,
    pub(crate) len: usize,
}

/// Builds a tree bottom-up from `records` inside `arena`.
///
/// Records are sorted and de-duplicated first. Leaves are filled up to
/// `leaf_capacity` and chained through `right_sibling`; internal levels
/// are built until a single root remains.
pub(crate) fn bulk_load(
    arena: &mut PageArena<Page>,
    mut records: Vec<Record>,
    options: &StoreOptions,
) -> Result<TreeShape> {
    options.validate()?;
    records.sort_unstable();
    records.dedup();
    let len = records.len();

    let chunks: Vec<Vec<Record>> = if records.is_empty() {
        vec![Vec::new()]
    } else {
        records
            .chunks(options.leaf_capacity)
            .map(<[Record]>::to_vec)
            .collect()
    };
    let first_leaf = arena.len();
    let leaf_count = chunks.len();
    let mut level: Vec<(Option<Record>, PageId)> = Vec::with_capacity(leaf_count);
    for (idx, chunk) in chunks.into_iter().enumerate() {
        let right_sibling = if idx + 1 < leaf_count {
            let next = u32::try_from(first_leaf + idx + 1)
                .map_err(|_| TrieJoinError::Invalid("page arena exhausted".into()))?;
            Some(PageId(next))
        } else {
            None
        };
        let min_key = chunk.first().copied();
        let id = arena.allocate(Page::Leaf(LeafPage {
            records: chunk,
            right_sibling,
        }))?;
        if id.0 as usize != first_leaf + idx {
            return Err(TrieJoinError::Corruption("leaf pages allocated out of order"));
        }
        level.push((min_key, id));
    }

    let mut height = 1u32;
    while level.len() > 1 {
        let mut parents = Vec::with_capacity(level.len() / options.internal_fanout + 1);
        for group in level.chunks(options.internal_fanout) {
            let separators = group[1..]
                .iter()
                .map(|(min_key, _)| {
                    min_key.ok_or(TrieJoinError::Corruption("empty leaf below internal page"))
                })
                .collect::<Result<Vec<_>>>()?;
            let children = group.iter().map(|(_, id)| *id).collect();
            let id = arena.allocate(Page::Internal(InternalPage {
                separators,
                children,
            }))?;
            parents.push((group[0].0, id));
        }
        level = parents;
        height += 1;
    }
    let root = level
        .first()
        .map(|(_, id)| *id)
        .ok_or(TrieJoinError::Corruption("bulk load produced no root"))?;
    tracing::debug!(
        target: "triejoin::btree::build",
        root = root.0,
        height,
        records = len,
        leaves = leaf_count,
        "btree.bulk_load.done"
    );
    Ok(TreeShape { root, height, len })
}

/// Read-only B+ tree over three-column records.
///
/// Pages live in a shared [`PageArena`]; every page a reader touches is
/// pinned first and unpinned once it is no longer needed.
#[derive(Clone)]
pub struct TripleTree {
    arena: Arc<PageArena<Page>>,
    root: PageId,
    height: u32,
    len: usize,
    stats: Arc<BTreeStats>,
}

impl TripleTree {
    pub(crate) fn new(arena: Arc<PageArena<Page>>, shape: TreeShape, stats: Arc<BTreeStats>) -> Self {
        Self {
            arena,
            root: shape.root,
            height: shape.height,
            len: shape.len,
            stats,
        }
    }

    /// Return the root page identifier.
    pub fn root_page(&self) -> PageId {
        self.root
    }

    /// Number of page levels, a lone leaf counting as one.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of records stored in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the tree holds no records.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Access the live statistics counters for this tree.
    pub fn stats(&self) -> Arc<BTreeStats> {
        Arc::clone(&self.stats)
    }

    /// Snapshot the current statistics counters.
    pub fn stats_snapshot(&self) -> BTreeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of pages of the backing arena that are currently pinned.
    pub fn pinned_pages(&self) -> usize {
        self.arena.pinned_pages()
    }

    pub(crate) fn pin_count(&self, id: PageId) -> u32 {
        self.arena.pin_count(id)
    }

    /// Point lookup.
    pub fn contains(&self, key: &Record) -> Result<bool> {
        let mut path = Path::new();
        self.push_root(&mut path)?;
        self.descend(&mut path, key)?;
        let found = match path.last() {
            Some(frame) => {
                let leaf = self.leaf(frame.page)?;
                let slot = leaf.lower_bound(key);
                leaf.records.get(slot) == Some(key)
            }
            None => false,
        };
        self.release_path(&mut path)?;
        Ok(found)
    }

    /// Ordered scan over the records inside `lower..upper`.
    pub fn range(&self, lower: Bound<Record>, upper: Bound<Record>) -> Result<RangeScan> {
        self.stats.inc_range_scans();
        RangeScan::new(self.clone(), lower, upper)
    }

    pub(crate) fn pin(&self, id: PageId) -> Result<()> {
        self.arena.pin(id)?;
        self.stats.inc_page_pins();
        Ok(())
    }

    pub(crate) fn unpin(&self, id: PageId) -> Result<()> {
        self.arena.unpin(id)?;
        self.stats.inc_page_unpins();
        Ok(())
    }

    pub(crate) fn page(&self, id: PageId) -> Result<&Page> {
        self.arena.page(id)
    }

    pub(crate) fn leaf(&self, id: PageId) -> Result<&LeafPage> {
        match self.page(id)? {
            Page::Leaf(leaf) => Ok(leaf),
            Page::Internal(_) => Err(TrieJoinError::Corruption("expected leaf page")),
        }
    }

    /// Pins the root and pushes it onto an empty path.
    pub(crate) fn push_root(&self, path: &mut Path) -> Result<()> {
        if !path.is_empty() {
            return Err(TrieJoinError::Corruption("root pushed onto non-empty path"));
        }
        self.pin(self.root)?;
        path.push(PathFrame {
            page: self.root,
            fences: Fences::UNBOUNDED,
        });
        Ok(())
    }

    /// Extends `path` from its (pinned) top frame down to the leaf whose
    /// fences cover `key`, pinning every page it enters.
    pub(crate) fn descend(&self, path: &mut Path, key: &Record) -> Result<()> {
        loop {
            let Some(top) = path.last().copied() else {
                return Err(TrieJoinError::Corruption("descent from empty path"));
            };
            match self.page(top.page)? {
                Page::Leaf(_) => {
                    self.stats.inc_leaf_searches();
                    tracing::trace!(
                        target: "triejoin::btree::search",
                        page = top.page.0,
                        kind = "leaf",
                        "located target leaf"
                    );
                    return Ok(());
                }
                Page::Internal(internal) => {
                    self.stats.inc_internal_searches();
                    tracing::trace!(
                        target: "triejoin::btree::search",
                        page = top.page.0,
                        kind = "internal",
                        "descending through internal node"
                    );
                    let idx = internal.child_index(key);
                    let child = *internal
                        .children
                        .get(idx)
                        .ok_or(TrieJoinError::Corruption("internal page without child"))?;
                    let fences = internal.child_fences(idx, top.fences);
                    self.pin(child)?;
                    path.push(PathFrame {
                        page: child,
                        fences,
                    });
                }
            }
        }
    }

    /// Pops and unpins every frame of `path`.
    pub(crate) fn release_path(&self, path: &mut Path) -> Result<()> {
        while let Some(frame) = path.pop() {
            self.unpin(frame.page)?;
        }
        Ok(())
    }
}
