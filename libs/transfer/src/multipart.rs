//! Multipart upload with per-part retry and a
//! shared abort signal that cancels the remaining parts of *this* upload
//! only on the first unrecoverable failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use storage::{MultipartUpload, Storage, UploadedPart};
use sync_api::{CannedAcl, ObjectDescriptor, SyncError};
use tokio::sync::Semaphore;

use crate::ratelimit::TokenBucket;
use crate::single::read_full;

const MIB: u64 = 1024 * 1024;

fn effective_part_size(upload: &MultipartUpload, default_part_size: u64, object_size: u64) -> u64 {
    let mut part_size = upload.min_part_size.max(default_part_size);
    if object_size > part_size * upload.max_count as u64 {
        let raw = (object_size + upload.max_count as u64 - 1) / upload.max_count as u64;
        part_size = ((raw + MIB - 1) / MIB) * MIB;
    }
    part_size
}

pub struct MultipartCopyParams {
    pub default_part_size: u64,
    pub pool: crate::BufferPool,
}

/// Runs the full multipart copy of one object. On any part failure, aborts
/// the upload (best-effort) and propagates the error; the caller (the
/// engine's single-copy fallback) decides whether to retry the whole object
/// as a single-shot copy when the destination reports `Unsupported`.
pub async fn do_copy_multiple(
    src: &Arc<dyn Storage>,
    dest: &Arc<dyn Storage>,
    descriptor: &ObjectDescriptor,
    acl: CannedAcl,
    permits: &Arc<Semaphore>,
    limiter: Option<&Arc<TokenBucket>>,
    params: &MultipartCopyParams,
) -> Result<(), SyncError> {
    let key = descriptor.key.as_str();
    let upload = dest
        .create_multipart_upload(key, params.default_part_size, acl)
        .await?;

    let part_size = effective_part_size(&upload, params.default_part_size, descriptor.size);
    let part_count = ((descriptor.size + part_size - 1) / part_size).max(1) as usize;

    let aborted = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::with_capacity(part_count);

    for i in 0..part_count {
        let off = i as u64 * part_size;
        let sz = part_size.min(descriptor.size - off);
        let src = src.clone();
        let dest = dest.clone();
        let key = key.to_string();
        let upload_id = upload.upload_id.clone();
        let permits = permits.clone();
        let limiter = limiter.cloned();
        let aborted = aborted.clone();
        let pool = params.pool.clone();

        handles.push(tokio::spawn(async move {
            if aborted.load(Ordering::Acquire) {
                return Err(SyncError::Cancelled);
            }
            if let Some(limiter) = &limiter {
                limiter.acquire(sz).await;
            }
            let _permit = match permits.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return Err(SyncError::Cancelled),
            };
            if aborted.load(Ordering::Acquire) {
                return Err(SyncError::Cancelled);
            }

            let mut attempt = 0u32;
            loop {
                attempt += 1;
                let result =
                    upload_one_part(&src, &dest, &key, &upload_id, i as u32 + 1, off, sz, &pool).await;
                match result {
                    Ok(part) => return Ok(part),
                    Err(_) if attempt < 3 => {
                        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                        continue;
                    }
                    Err(e) => {
                        aborted.store(true, Ordering::Release);
                        return Err(e);
                    }
                }
            }
        }));
    }

    let mut parts = Vec::with_capacity(part_count);
    let mut first_error: Option<SyncError> = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(part)) => parts.push(part),
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(_join_err) => {
                if first_error.is_none() {
                    first_error = Some(SyncError::Cancelled);
                }
            }
        }
    }

    if let Some(e) = first_error {
        dest.abort_upload(key, &upload.upload_id).await;
        return Err(e);
    }

    parts.sort_by_key(|p: &UploadedPart| p.num);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match dest
            .complete_upload(key, &upload.upload_id, parts.clone())
            .await
        {
            Ok(()) => return Ok(()),
            Err(_) if attempt < 3 => {
                tokio::time::sleep(std::time::Duration::from_millis(200 * attempt as u64)).await;
            }
            Err(e) => {
                dest.abort_upload(key, &upload.upload_id).await;
                return Err(e);
            }
        }
    }
}

async fn upload_one_part(
    src: &Arc<dyn Storage>,
    dest: &Arc<dyn Storage>,
    key: &str,
    upload_id: &str,
    num: u32,
    off: u64,
    sz: u64,
    pool: &crate::BufferPool,
) -> Result<UploadedPart, SyncError> {
    let bytes = read_full(src, key, off, sz, pool).await?;
    dest.upload_part(key, upload_id, num, bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(min_part_size: u64, max_count: u32) -> MultipartUpload {
        MultipartUpload {
            upload_id: "id".into(),
            min_part_size,
            max_count,
        }
    }

    #[test]
    fn uses_default_part_size_when_under_max_count() {
        let u = upload(0, 10_000);
        let size = effective_part_size(&u, 50 * MIB, 120 * MIB);
        assert_eq!(size, 50 * MIB);
    }

    #[test]
    fn recomputes_part_size_when_default_would_exceed_max_count() {
        let u = upload(5 * MIB, 10);
        // 10 parts at 5 MiB max = 50 MiB ceiling; a 100 MiB object needs bigger parts.
        let size = effective_part_size(&u, 5 * MIB, 100 * MIB);
        assert!(size > 5 * MIB);
        assert!(size * 10 >= 100 * MIB);
    }
}
