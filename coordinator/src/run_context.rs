//! Coordinator-wide state: the stored sync plan, the shared task queue, and
//! per-bucket stats, all reachable from every RPC handler through one
//! `Arc<RunContext>`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use storage::registry::Registry;
use sync_api::{AccountUri, BucketPairing, BucketStats, SyncError};
use taskqueue::{TaskQueueReceiver, TaskQueueSender};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::metrics::Metrics;

/// The result of the most recent `Sync` call: the pairing plan plus the
/// two account endpoints it was computed from (needed again at `Start`
/// time to build each pair's per-bucket `StorageUri`s).
pub struct Plan {
    pub pairings: Vec<BucketPairing>,
    pub src_account: AccountUri,
    pub dest_account: AccountUri,
}

pub struct RunContext {
    pub registry: Registry,
    pub metrics: Metrics,
    pub shutdown: CancellationToken,
    queue_tx: TaskQueueSender,
    /// `mpsc::Receiver` has one owner; wrapped so every `DataStream` call
    /// (one per connected worker) can take a turn without needing its own
    /// channel.
    queue_rx: Arc<AsyncMutex<TaskQueueReceiver>>,
    plan: AsyncMutex<Option<Plan>>,
    stats: DashMap<String, Arc<BucketStats>>,
    running: AtomicBool,
}

impl RunContext {
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = taskqueue::channel();
        Self {
            registry: Registry::new(),
            metrics: Metrics::new(),
            shutdown: CancellationToken::new(),
            queue_tx,
            queue_rx: Arc::new(AsyncMutex::new(queue_rx)),
            plan: AsyncMutex::new(None),
            stats: DashMap::new(),
            running: AtomicBool::new(false),
        }
    }

    pub async fn set_plan(&self, plan: Plan) {
        let mut guard = self.plan.lock().await;
        self.stats.clear();
        for pairing in &plan.pairings {
            self.stats.insert(pairing.name.clone(), Arc::new(BucketStats::new()));
        }
        *guard = Some(plan);
    }

    pub async fn current_pairings(&self) -> Vec<BucketPairing> {
        self.plan
            .lock()
            .await
            .as_ref()
            .map(|p| p.pairings.clone())
            .unwrap_or_default()
    }

    pub fn stats_for(&self, bucket: &str) -> Option<Arc<BucketStats>> {
        self.stats.get(bucket).map(|e| e.value().clone())
    }

    pub fn all_stats(&self) -> Vec<(String, Arc<BucketStats>)> {
        self.stats.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }

    pub fn queue_sender(&self) -> TaskQueueSender {
        self.queue_tx.clone()
    }

    pub fn queue_receiver(&self) -> Arc<AsyncMutex<TaskQueueReceiver>> {
        Arc::clone(&self.queue_rx)
    }

    /// CAS guard: only one `Start` may be running at a time.
    pub fn try_start(&self) -> Result<(), SyncError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| SyncError::Invalid("a run is already in progress".into()))
    }

    pub fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Launches one listing producer per stored pairing. Returns the
    /// snapshot of pairings launched so the caller can log/report them.
    pub async fn launch_producers(self: &Arc<Self>) -> Result<Vec<BucketPairing>, SyncError> {
        let guard = self.plan.lock().await;
        let plan = guard
            .as_ref()
            .ok_or_else(|| SyncError::Invalid("no sync plan has been computed yet".into()))?;
        let pairings = plan.pairings.clone();
        let src_account = plan.src_account.clone();
        let dest_account = plan.dest_account.clone();
        drop(guard);

        for pairing in &pairings {
            let bucket_name = pairing.name.clone();
            let orientation = pairing.orientation;
            let src_uri = sync_api::StorageUri {
                resource_type: src_account.resource_type,
                bucket_domain: pairing.src_bucket_domain.clone(),
                access_key: src_account.access_key.clone(),
                secret_key: src_account.secret_key.clone(),
            };
            let dest_uri = sync_api::StorageUri {
                resource_type: dest_account.resource_type,
                bucket_domain: pairing.dest_bucket_domain.clone(),
                access_key: dest_account.access_key.clone(),
                secret_key: dest_account.secret_key.clone(),
            };
            let stats = self
                .stats_for(&bucket_name)
                .unwrap_or_else(|| Arc::new(BucketStats::new()));
            let queue = self.queue_sender();
            let ctx = Arc::clone(self);
            let span = tracing::info_span!("listing_producer", bucket = %bucket_name);

            tokio::spawn(
                async move {
                    let registry = &ctx.registry;
                    if let Err(e) =
                        pairing::run_pair(bucket_name.clone(), orientation, src_uri, dest_uri, registry, queue, stats)
                            .await
                    {
                        tracing::warn!(error = %e, "pairing producer exited early");
                    }
                }
                .instrument(span),
            );
        }

        Ok(pairings)
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
