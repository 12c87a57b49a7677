use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Snapshot of join statistics at a point in time.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinStatsSnapshot {
    /// Cursor `open` calls
    pub opens: u64,
    /// Cursor `next` calls, including seeks that degrade to `next`
    pub nexts: u64,
    /// Cursor `seek` calls that moved forward
    pub seeks: u64,
    /// No-intersection buffer blocks materialized
    pub buffer_blocks: u64,
    /// Keys on which every cursor of a level agreed
    pub intersections: u64,
    /// Times the engine stepped back one level
    pub backtracks: u64,
}

impl JoinStatsSnapshot {
    /// Cursor moves issued by leapfrog search.
    pub fn moves(&self) -> u64 {
        self.nexts + self.seeks
    }
}

/// Thread-safe counters shared by every cursor and engine of a plan.
#[derive(Default, Debug)]
pub struct JoinStats {
    opens: AtomicU64,
    nexts: AtomicU64,
    seeks: AtomicU64,
    buffer_blocks: AtomicU64,
    intersections: AtomicU64,
    backtracks: AtomicU64,
}

impl JoinStats {
    pub(crate) fn inc_opens(&self) {
        self.opens.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_nexts(&self) {
        self.nexts.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_seeks(&self) {
        self.seeks.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_buffer_blocks(&self) {
        self.buffer_blocks.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_intersections(&self) {
        self.intersections.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_backtracks(&self) {
        self.backtracks.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Creates a snapshot of all current statistics.
    pub fn snapshot(&self) -> JoinStatsSnapshot {
        JoinStatsSnapshot {
            opens: self.opens.load(AtomicOrdering::Relaxed),
            nexts: self.nexts.load(AtomicOrdering::Relaxed),
            seeks: self.seeks.load(AtomicOrdering::Relaxed),
            buffer_blocks: self.buffer_blocks.load(AtomicOrdering::Relaxed),
            intersections: self.intersections.load(AtomicOrdering::Relaxed),
            backtracks: self.backtracks.load(AtomicOrdering::Relaxed),
        }
    }

    /// Emits current statistics to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            target: "triejoin::join::stats",
            opens = snapshot.opens,
            nexts = snapshot.nexts,
            seeks = snapshot.seeks,
            buffer_blocks = snapshot.buffer_blocks,
            intersections = snapshot.intersections,
            backtracks = snapshot.backtracks,
            "join stats snapshot"
        );
    }
}
