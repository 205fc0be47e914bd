use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Plain-data snapshot of [`BucketStats`], suitable for serialization onto
/// the wire or into a log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub scanned: u64,
    pub skipped: u64,
    pub copied: u64,
    pub failed: u64,
    pub size_bytes: u64,
    pub finish: bool,
}

impl std::ops::Add for StatsSnapshot {
    type Output = StatsSnapshot;

    fn add(self, rhs: Self) -> Self::Output {
        StatsSnapshot {
            scanned: self.scanned + rhs.scanned,
            skipped: self.skipped + rhs.skipped,
            copied: self.copied + rhs.copied,
            failed: self.failed + rhs.failed,
            size_bytes: self.size_bytes + rhs.size_bytes,
            finish: self.finish && rhs.finish,
        }
    }
}

/// Live, concurrently-updated per-bucket counters.
///
/// Every field is an independent atomic rather than a struct behind a lock:
/// readers (the `stat`/`start` progress streams) only ever need a point-in-time
/// snapshot, never a multi-field transaction, so there is nothing a lock would
/// buy beyond contention.
#[derive(Debug, Default)]
pub struct BucketStats {
    scanned: AtomicU64,
    skipped: AtomicU64,
    copied: AtomicU64,
    failed: AtomicU64,
    size_bytes: AtomicU64,
    finish: AtomicBool,
    listing_done: AtomicBool,
}

impl BucketStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by listing producers as they enqueue a batch: increments
    /// `scanned` *before* the batch is visible to any worker, so that
    /// `copied + failed <= scanned` always holds on observation.
    pub fn add_scanned(&self, n: u64) {
        self.scanned.fetch_add(n, Ordering::SeqCst);
    }

    pub fn add_skipped(&self, n: u64) {
        self.skipped.fetch_add(n, Ordering::SeqCst);
    }

    /// Applies a worker's `PutResult` and recomputes `finish`. Returns the
    /// resulting snapshot.
    pub fn apply_result(&self, copied: u64, failed: u64, bytes: u64) -> StatsSnapshot {
        self.copied.fetch_add(copied, Ordering::SeqCst);
        self.failed.fetch_add(failed, Ordering::SeqCst);
        self.size_bytes.fetch_add(bytes, Ordering::SeqCst);
        self.maybe_finish();
        self.snapshot()
    }

    /// Called by a listing producer once its pair's production has
    /// terminated, so `finish` can become true even if the last batch's
    /// results arrive afterwards.
    pub fn mark_listing_done(&self) {
        self.listing_done.store(true, Ordering::SeqCst);
        self.maybe_finish();
    }

    /// `finish` requires both the count balance *and* that the listing
    /// pipeline has stopped producing (§3): otherwise a worker draining an
    /// early batch before the producer enqueues the next one would make
    /// `copied+failed==scanned` transiently true and latch `finish` early.
    fn maybe_finish(&self) {
        if !self.listing_done.load(Ordering::SeqCst) {
            return;
        }
        let scanned = self.scanned.load(Ordering::SeqCst);
        let copied = self.copied.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        if copied + failed == scanned {
            // Monotonic: never cleared once set.
            self.finish.store(true, Ordering::SeqCst);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            scanned: self.scanned.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            copied: self.copied.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            size_bytes: self.size_bytes.load(Ordering::SeqCst),
            finish: self.finish.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_flips_once_counts_balance() {
        let s = BucketStats::new();
        s.add_scanned(2);
        assert!(!s.snapshot().finish);
        s.apply_result(1, 0, 10);
        assert!(!s.snapshot().finish);
        s.mark_listing_done();
        assert!(!s.snapshot().finish);
        s.apply_result(0, 1, 0);
        assert!(s.snapshot().finish);
    }

    #[test]
    fn finish_stays_false_while_listing_is_still_producing() {
        // A worker can drain and report a batch before the producer has
        // enqueued the next one; counts balance transiently but `finish`
        // must not latch until the listing pipeline itself has terminated.
        let s = BucketStats::new();
        s.add_scanned(1);
        s.apply_result(1, 0, 5);
        assert!(!s.snapshot().finish);
        s.add_scanned(1);
        s.apply_result(1, 0, 5);
        assert!(!s.snapshot().finish);
        s.mark_listing_done();
        assert!(s.snapshot().finish);
    }

    #[test]
    fn finish_never_reverts() {
        let s = BucketStats::new();
        s.add_scanned(1);
        s.apply_result(1, 0, 5);
        s.mark_listing_done();
        assert!(s.snapshot().finish);
        s.add_scanned(1);
        // finish was true; maybe_finish only ever sets true, never clears.
        assert!(s.snapshot().finish);
    }
}
