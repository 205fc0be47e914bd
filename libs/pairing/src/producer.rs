//! Launches one listing producer per bucket pair: `With` pairs run
//! the diff-listing merge-walk, `To`/`From` pairs run a full listing of
//! whichever side holds the objects. In both cases the destination bucket
//! is created first if it doesn't yet exist; a creation failure aborts the
//! pair without touching the task queue.

use std::sync::Arc;

use storage::registry::Registry;
use storage::Storage;
use sync_api::{BucketStats, Orientation, StorageUri, SyncError};
use taskqueue::{BatchBuilder, TaskQueueSender};

use crate::listing::list_bucket;

/// Runs the listing producer for one pair to completion. Always marks the
/// bucket's listing as done on exit (success or failure) so `finish` can
/// still flip true once any in-flight results land.
pub async fn run_pair(
    bucket_name: String,
    orientation: Orientation,
    src_uri: StorageUri,
    dest_uri: StorageUri,
    registry: &Registry,
    queue: TaskQueueSender,
    stats: Arc<BucketStats>,
) -> Result<(), SyncError> {
    let result = run_pair_inner(
        &bucket_name,
        orientation,
        src_uri,
        dest_uri,
        registry,
        &queue,
        &stats,
    )
    .await;
    stats.mark_listing_done();
    if let Err(e) = &result {
        tracing::warn!(bucket = %bucket_name, error = %e, "listing producer for pair stopped early");
    }
    result
}

async fn run_pair_inner(
    bucket_name: &str,
    orientation: Orientation,
    src_uri: StorageUri,
    dest_uri: StorageUri,
    registry: &Registry,
    queue: &TaskQueueSender,
    stats: &Arc<BucketStats>,
) -> Result<(), SyncError> {
    let src = registry.get_or_create(&src_uri)?;
    let dest = registry.get_or_create(&dest_uri)?;

    match orientation {
        Orientation::With => {
            dest.create().await?;
            let src_stream = list_bucket(dyn_storage(src), String::new(), String::new(), None);
            let dest_stream = list_bucket(dyn_storage(dest), String::new(), String::new(), None);
            let mut builder = BatchBuilder::new(bucket_name, src_uri, dest_uri, queue, stats);
            crate::diff::run(src_stream, dest_stream, &mut builder)
                .await
                .map_err(|_| SyncError::Cancelled)
        }
        Orientation::To | Orientation::From => {
            // `To`/`From` both mean "the side that holds objects copies onto the
            // side that doesn't"; for `From` the holder is `dest_uri`/`dest`, so the
            // task's copy direction is the reverse of the pairing's (src, dest)
            // naming. `holder`/`created` below always mean "copy source handle"/
            // "copy destination handle", not the account-level naming above.
            let (holder, created, copy_src_uri, copy_dest_uri) = match orientation {
                Orientation::To => (src.clone(), dest.clone(), src_uri, dest_uri),
                _ => (dest.clone(), src.clone(), dest_uri, src_uri),
            };
            created.create().await?;
            let stream = list_bucket(dyn_storage(holder), String::new(), String::new(), None);
            let mut builder = BatchBuilder::new(bucket_name, copy_src_uri, copy_dest_uri, queue, stats);
            futures::pin_mut!(stream);
            use futures::StreamExt;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(descriptor) => {
                        builder
                            .push(descriptor)
                            .await
                            .map_err(|_| SyncError::Cancelled)?;
                    }
                    Err(_) => break,
                }
            }
            builder.flush().await.map_err(|_| SyncError::Cancelled)
        }
    }
}

fn dyn_storage(handle: Arc<storage::registry::GenericStorage>) -> Arc<dyn Storage> {
    handle
}
