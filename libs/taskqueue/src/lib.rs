//! The bounded task queue: a multi-producer/multi-consumer FIFO of
//! [`Task`] batches shared between listing producers and the dispatch
//! server.
//!
//! Every listing producer for every bucket pair shares one
//! `tokio::sync::mpsc` channel; `mpsc` supports that natively, and the
//! ordering guarantee actually needed — "`scanned` is bumped before the
//! batch is visible to a worker" — only constrains a single producer's own
//! batches relative to each other.

use std::sync::Arc;

use sync_api::{BucketStats, ObjectDescriptor, StorageUri, Task, BATCH_SIZE, TASK_QUEUE_CAPACITY};
use tokio::sync::mpsc;

/// The producing half, held by listing tasks.
#[derive(Clone)]
pub struct TaskQueueSender {
    tx: mpsc::Sender<Task>,
}

/// The consuming half, held by the dispatch server.
pub struct TaskQueueReceiver {
    rx: mpsc::Receiver<Task>,
}

/// Creates a fresh bounded queue at the fixed capacity.
pub fn channel() -> (TaskQueueSender, TaskQueueReceiver) {
    let (tx, rx) = mpsc::channel(TASK_QUEUE_CAPACITY);
    (TaskQueueSender { tx }, TaskQueueReceiver { rx })
}

impl TaskQueueSender {
    /// Enqueues `task`, blocking (back-pressuring the listing producer) if
    /// the queue is full. Increments `stats.scanned` by the batch's length
    /// *before* awaiting the send, so that the invariant "`scanned` is
    /// updated before the batch is observable by any worker" holds even
    /// under queue back-pressure.
    pub async fn enqueue(&self, task: Task, stats: &BucketStats) -> Result<(), mpsc::error::SendError<Task>> {
        stats.add_scanned(task.objects.len() as u64);
        self.tx.send(task).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl TaskQueueReceiver {
    pub async fn recv(&mut self) -> Option<Task> {
        self.rx.recv().await
    }

    /// Non-blocking peek used by the `HasMore` RPC: reports whether
    /// at least one task is currently queued, without consuming it.
    pub fn has_more(&self) -> bool {
        !self.rx.is_empty()
    }
}

/// Accumulates object descriptors into batches of at most [`BATCH_SIZE`],
/// enqueuing each full batch (and any final partial one) as a [`Task`] for
/// the named bucket pair. Used by every listing producer (full listing and
/// diff listing alike) so the 500-object cap lives in exactly one place.
pub struct BatchBuilder<'a> {
    bucket_name: String,
    src_uri: StorageUri,
    dest_uri: StorageUri,
    queue: &'a TaskQueueSender,
    stats: &'a BucketStats,
    pending: Vec<ObjectDescriptor>,
}

impl<'a> BatchBuilder<'a> {
    pub fn new(
        bucket_name: impl Into<String>,
        src_uri: StorageUri,
        dest_uri: StorageUri,
        queue: &'a TaskQueueSender,
        stats: &'a BucketStats,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            src_uri,
            dest_uri,
            queue,
            stats,
            pending: Vec::with_capacity(BATCH_SIZE),
        }
    }

    /// Adds one descriptor, flushing a full batch if this fills it.
    pub async fn push(
        &mut self,
        descriptor: ObjectDescriptor,
    ) -> Result<(), mpsc::error::SendError<Task>> {
        self.pending.push(descriptor);
        if self.pending.len() >= BATCH_SIZE {
            self.flush().await?;
        }
        Ok(())
    }

    /// Enqueues whatever is buffered, even if it's a partial batch. Called
    /// automatically by `push` and must be called once more by the
    /// producer when its source is exhausted.
    pub async fn flush(&mut self) -> Result<(), mpsc::error::SendError<Task>> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let objects = std::mem::replace(&mut self.pending, Vec::with_capacity(BATCH_SIZE));
        let task = Task::new(
            self.bucket_name.clone(),
            self.src_uri.clone(),
            self.dest_uri.clone(),
            objects,
        );
        self.queue.enqueue(task, self.stats).await
    }
}

/// Handy alias for the `Arc<BucketStats>` map producers and the dispatch
/// server both hold a clone of.
pub type SharedStats = Arc<BucketStats>;

#[cfg(test)]
mod tests {
    use super::*;
    use sync_api::{ResourceType, StorageUri};

    fn uri() -> StorageUri {
        StorageUri {
            resource_type: ResourceType::File,
            bucket_domain: "/tmp/x".into(),
            access_key: String::new(),
            secret_key: String::new(),
        }
    }

    #[tokio::test]
    async fn batches_never_exceed_batch_size() {
        let (tx, mut rx) = channel();
        let stats = BucketStats::new();
        let mut builder = BatchBuilder::new("b", uri(), uri(), &tx, &stats);
        for i in 0..(BATCH_SIZE * 2 + 7) {
            builder
                .push(ObjectDescriptor::new(format!("k{i}"), 1, 0))
                .await
                .unwrap();
        }
        builder.flush().await.unwrap();
        drop(builder);
        drop(tx);

        let mut total = 0;
        while let Some(task) = rx.recv().await {
            assert!(task.objects.len() <= BATCH_SIZE);
            total += task.objects.len();
        }
        assert_eq!(total, BATCH_SIZE * 2 + 7);
    }

    #[tokio::test]
    async fn enqueue_bumps_scanned_before_send_completes() {
        let (tx, mut rx) = channel();
        let stats = BucketStats::new();
        tx.enqueue(
            Task::new("b", uri(), uri(), vec![ObjectDescriptor::new("a", 1, 0)]),
            &stats,
        )
        .await
        .unwrap();
        assert_eq!(stats.snapshot().scanned, 1);
        assert!(rx.recv().await.is_some());
    }
}
