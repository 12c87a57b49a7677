use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Snapshot of B+ tree statistics at a point in time.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeStatsSnapshot {
    /// Number of leaf pages reached by a root-to-leaf descent
    pub leaf_searches: u64,
    /// Number of internal pages traversed by descents
    pub internal_searches: u64,
    /// Number of page pins taken
    pub page_pins: u64,
    /// Number of page pins released
    pub page_unpins: u64,
    /// Number of range scans opened
    pub range_scans: u64,
}

/// Thread-safe statistics tracking for B+ tree reads.
#[derive(Default, Debug)]
pub struct BTreeStats {
    leaf_searches: AtomicU64,
    internal_searches: AtomicU64,
    page_pins: AtomicU64,
    page_unpins: AtomicU64,
    range_scans: AtomicU64,
}

impl BTreeStats {
    /// Returns the current count of leaf page searches.
    pub fn leaf_searches(&self) -> u64 {
        self.leaf_searches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of internal page searches.
    pub fn internal_searches(&self) -> u64 {
        self.internal_searches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of pins taken so far.
    pub fn page_pins(&self) -> u64 {
        self.page_pins.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of pins released so far.
    pub fn page_unpins(&self) -> u64 {
        self.page_unpins.load(AtomicOrdering::Relaxed)
    }

    /// Returns the number of range scans opened so far.
    pub fn range_scans(&self) -> u64 {
        self.range_scans.load(AtomicOrdering::Relaxed)
    }

    pub(crate) fn inc_leaf_searches(&self) {
        self.leaf_searches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_searches(&self) {
        self.internal_searches
            .fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_page_pins(&self) {
        self.page_pins.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_page_unpins(&self) {
        self.page_unpins.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_range_scans(&self) {
        self.range_scans.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Creates a snapshot of all current statistics.
    pub fn snapshot(&self) -> BTreeStatsSnapshot {
        BTreeStatsSnapshot {
            leaf_searches: self.leaf_searches(),
            internal_searches: self.internal_searches(),
            page_pins: self.page_pins(),
            page_unpins: self.page_unpins(),
            range_scans: self.range_scans(),
        }
    }

    /// Emits current statistics to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            target: "triejoin::btree::stats",
            leaf_searches = snapshot.leaf_searches,
            internal_searches = snapshot.internal_searches,
            page_pins = snapshot.page_pins,
            page_unpins = snapshot.page_unpins,
            range_scans = snapshot.range_scans,
            "btree stats snapshot"
        );
    }
}
