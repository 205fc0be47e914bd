//! Prometheus-shaped view over the same numbers `BucketStats` already
//! tracks. No HTTP exporter is wired up; the registry
//! exists so one is a few lines away, not a redesign. Sampled from the same
//! 1 Hz ticker that feeds the `Start`/`Stat` progress streams, so `Stats`
//! stays the single source of truth and these gauges just mirror it.

use prometheus::{IntGaugeVec, Opts, Registry};
use sync_api::StatsSnapshot;

pub struct Metrics {
    pub registry: Registry,
    scanned: IntGaugeVec,
    copied: IntGaugeVec,
    failed: IntGaugeVec,
    skipped: IntGaugeVec,
    bytes: IntGaugeVec,
    queue_depth: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let gauge = |name: &str, help: &str| -> IntGaugeVec {
            let g = IntGaugeVec::new(Opts::new(name, help), &["bucket"]).expect("valid metric");
            registry.register(Box::new(g.clone())).expect("metric registered once");
            g
        };
        Self {
            scanned: gauge("sync_objects_scanned", "objects scanned per bucket"),
            copied: gauge("sync_objects_copied", "objects copied per bucket"),
            failed: gauge("sync_objects_failed", "objects failed per bucket"),
            skipped: gauge("sync_objects_skipped", "objects skipped per bucket"),
            bytes: gauge("sync_bytes_copied", "bytes copied per bucket"),
            queue_depth: gauge("sync_task_queue_depth", "tasks currently queued (global)"),
            registry,
        }
    }

    /// Mirrors one bucket's snapshot; called from the same progress ticker
    /// that drives `Start`/`Stat` so this stays a view over `Stats`, not a
    /// second source of truth.
    pub fn observe_bucket(&self, bucket: &str, snapshot: &StatsSnapshot) {
        self.scanned.with_label_values(&[bucket]).set(snapshot.scanned as i64);
        self.copied.with_label_values(&[bucket]).set(snapshot.copied as i64);
        self.failed.with_label_values(&[bucket]).set(snapshot.failed as i64);
        self.skipped.with_label_values(&[bucket]).set(snapshot.skipped as i64);
        self.bytes.with_label_values(&[bucket]).set(snapshot.size_bytes as i64);
    }

    pub fn set_queue_depth(&self, depth: i64) {
        self.queue_depth.with_label_values(&["_global"]).set(depth);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
