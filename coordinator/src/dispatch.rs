//! The `Pipe` gRPC service: streaming pull protocol, result
//! ingestion, plan computation, and the progress streams the `sync_cli`
//! subcommands drive.

use std::sync::Arc;
use std::time::Duration;

use protocol::pipe_server::Pipe;
use protocol::{
    BucketPairRow, Empty, HasMoreReply, ProgressUpdate, PutResultReply, PutResultRequest, Signal,
    StatUpdate, SyncReply, SyncRequest, TaskEnvelope,
};
use storage::inventory;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};

use crate::run_context::{Plan, RunContext};

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

pub struct Coordinator {
    ctx: Arc<RunContext>,
}

impl Coordinator {
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }
}

#[tonic::async_trait]
impl Pipe for Coordinator {
    type DataStreamStream = ReceiverStream<Result<TaskEnvelope, Status>>;
    type StartStream = ReceiverStream<Result<ProgressUpdate, Status>>;
    type StatStream = ReceiverStream<Result<StatUpdate, Status>>;

    /// One stream per connected worker. On `"free"` it blocks on the shared
    /// queue until a task is available or the run has drained; on `"close"`
    /// it replies with a nil task and ends the stream; any other sign gets
    /// a nil task but the stream stays open for the worker's next signal.
    async fn data_stream(
        &self,
        request: Request<Streaming<Signal>>,
    ) -> Result<Response<Self::DataStreamStream>, Status> {
        let mut incoming = request.into_inner();
        let queue_rx = self.ctx.queue_receiver();
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            while let Some(signal) = match incoming.message().await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "worker signal stream errored");
                    None
                }
            } {
                match signal.sign.as_str() {
                    "free" => {
                        let task = queue_rx.lock().await.recv().await;
                        let ended = task.is_none();
                        let envelope = TaskEnvelope::from(task);
                        if tx.send(Ok(envelope)).await.is_err() || ended {
                            break;
                        }
                    }
                    "close" => {
                        let _ = tx.send(Ok(TaskEnvelope { task: None })).await;
                        break;
                    }
                    other => {
                        tracing::debug!(sign = other, "unrecognized signal");
                        if tx.send(Ok(TaskEnvelope { task: None })).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn has_more(&self, _request: Request<Empty>) -> Result<Response<HasMoreReply>, Status> {
        let has = self.ctx.queue_receiver().lock().await.has_more();
        Ok(Response::new(HasMoreReply { has }))
    }

    async fn put_result(
        &self,
        request: Request<PutResultRequest>,
    ) -> Result<Response<PutResultReply>, Status> {
        let req = request.into_inner();
        let stats = self.ctx.stats_for(&req.bucket_name).ok_or_else(|| {
            Status::not_found(format!("unknown bucket {:?}", req.bucket_name))
        })?;
        let snapshot = stats.apply_result(
            req.success.len() as u64,
            req.failed.len() as u64,
            req.bytes_delta,
        );
        self.ctx.metrics.observe_bucket(&req.bucket_name, &snapshot);
        tracing::info!(
            bucket = %req.bucket_name,
            worker = %req.worker_id,
            success = req.success.len(),
            failed = req.failed.len(),
            "put_result ingested"
        );
        Ok(Response::new(PutResultReply { status: "0".into() }))
    }

    async fn sync(&self, request: Request<SyncRequest>) -> Result<Response<SyncReply>, Status> {
        let req = request.into_inner();
        let src_account: sync_api::AccountUri = req
            .src
            .ok_or_else(|| Status::invalid_argument("missing src account"))?
            .try_into()
            .map_err(|e| protocol::to_tonic_status(&e))?;
        let dest_account: sync_api::AccountUri = req
            .dest
            .ok_or_else(|| Status::invalid_argument("missing dest account"))?
            .try_into()
            .map_err(|e| protocol::to_tonic_status(&e))?;

        let src_buckets = inventory::list_buckets(&src_account)
            .await
            .map_err(|e| protocol::to_tonic_status(&e))?;
        let dest_buckets = inventory::list_buckets(&dest_account)
            .await
            .map_err(|e| protocol::to_tonic_status(&e))?;

        let pairings = pairing::compute_pairing(
            &src_buckets,
            &dest_buckets,
            src_account.resource_type,
            dest_account.resource_type,
            &dest_account.region,
            &src_account.region,
        );

        let buckets: Vec<BucketPairRow> = pairings.iter().cloned().map(Into::into).collect();
        self.ctx
            .set_plan(Plan {
                pairings,
                src_account,
                dest_account,
            })
            .await;

        Ok(Response::new(SyncReply {
            status: "0".into(),
            buckets,
        }))
    }

    async fn start(&self, _request: Request<Empty>) -> Result<Response<Self::StartStream>, Status> {
        self.ctx.try_start().map_err(|e| protocol::to_tonic_status(&e))?;
        self.ctx
            .launch_producers()
            .await
            .map_err(|e| protocol::to_tonic_status(&e))?;

        let ctx = Arc::clone(&self.ctx);
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
            loop {
                ticker.tick().await;
                let pairs = ctx.all_stats();
                let all_finished = !pairs.is_empty() && pairs.iter().all(|(_, s)| s.snapshot().finish);
                let total = pairs
                    .iter()
                    .map(|(name, s)| {
                        let snapshot = s.snapshot();
                        ctx.metrics.observe_bucket(name, &snapshot);
                        snapshot
                    })
                    .fold(sync_api::StatsSnapshot::default(), |a, b| a + b);
                ctx.metrics.set_queue_depth(if ctx.queue_receiver().try_lock().map(|g| g.has_more()).unwrap_or(false) { 1 } else { 0 });

                if tx.send(Ok(ProgressUpdate { value: Some(total.into()) })).await.is_err() {
                    break;
                }
                if all_finished {
                    ctx.mark_stopped();
                    break;
                }
            }
        });
        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn stat(&self, _request: Request<Empty>) -> Result<Response<Self::StatStream>, Status> {
        let ctx = Arc::clone(&self.ctx);
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
            loop {
                ticker.tick().await;
                let pairs = ctx.all_stats();
                let summaries: Vec<_> = pairs
                    .iter()
                    .map(|(name, s)| (name.clone(), s.snapshot()).into())
                    .collect();
                let total = pairs
                    .iter()
                    .map(|(_, s)| s.snapshot())
                    .fold(sync_api::StatsSnapshot::default(), |a, b| a + b);
                if tx
                    .send(Ok(StatUpdate {
                        value: Some(total.into()),
                        bucket_summary: summaries,
                    }))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });
        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn stop(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        Err(Status::unimplemented("stop is reserved"))
    }
}
