//! Executes one delivered [`sync_api::Task`] batch: every object is copied
//! concurrently (the `TransferEngine`'s semaphore is what actually bounds
//! in-flight I/O).

use std::sync::Arc;

use storage::registry::Registry;
use storage::Storage;
use sync_api::{CannedAcl, SyncError, Task};
use transfer::TransferEngine;

pub struct ExecutionOutcome {
    pub success: Vec<String>,
    pub failed: Vec<String>,
    pub bytes_delta: u64,
}

pub async fn execute(
    task: &Task,
    engine: &Arc<TransferEngine>,
    registry: &Registry,
) -> Result<ExecutionOutcome, SyncError> {
    let src: Arc<dyn Storage> = registry.get_or_create(&task.src_uri)?;
    let dest: Arc<dyn Storage> = registry.get_or_create(&task.dest_uri)?;
    let src_type = task.src_uri.resource_type;
    let dest_type = task.dest_uri.resource_type;

    let mut handles = Vec::with_capacity(task.objects.len());
    for descriptor in task.objects.clone() {
        let key = descriptor.key.clone();
        let size = descriptor.size;
        let engine = Arc::clone(engine);
        let src = Arc::clone(&src);
        let dest = Arc::clone(&dest);
        let join = tokio::spawn(async move {
            let acl = src
                .get_object_acl(&descriptor.key)
                .await
                .unwrap_or(CannedAcl::Default);
            engine
                .copy_object(&src, &dest, &descriptor, acl, src_type, dest_type)
                .await
        });
        handles.push((key, size, join));
    }

    let mut outcome = ExecutionOutcome {
        success: Vec::new(),
        failed: Vec::new(),
        bytes_delta: 0,
    };
    for (key, size, handle) in handles {
        match handle.await {
            Ok(Ok(())) => {
                outcome.bytes_delta += size;
                outcome.success.push(key);
            }
            Ok(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "object copy failed");
                outcome.failed.push(key);
            }
            Err(join_err) => {
                tracing::error!(key = %key, error = %join_err, "copy task panicked");
                outcome.failed.push(key);
            }
        }
    }

    Ok(outcome)
}
