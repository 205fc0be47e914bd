//! The single-shot copy path used for objects under
//! `maxBlock`, and for larger objects whose source can't profitably be
//! ranged (local file, URL list).

use std::sync::Arc;

use storage::{PutBody, Storage};
use sync_api::{CannedAcl, ObjectDescriptor};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Semaphore;

use crate::downloader::RangedDownloader;
use crate::ratelimit::TokenBucket;

/// `<sourceURL> <destKey>` split for URL-list sources: the
/// destination key is always the second whitespace-separated field.
pub fn url_source_dest_key(key: &str) -> &str {
    key.split_once(char::is_whitespace)
        .map(|(_, dest)| dest)
        .unwrap_or(key)
}

pub struct SingleCopyParams {
    pub max_block_bytes: u64,
    pub downloader_concurrency: usize,
}

/// Copies one object from `src` to `dest`, dispatching to the parallel
/// ranged downloader when the source isn't local/URL-backed and the object
/// is large enough that ranged parallel fetch beats a single stream.
///
/// `descriptor.key` is the source-side key verbatim (for a URL-list source
/// this is the whole `"<url> <destKey>"` line); the destination key is
/// derived via [`url_source_dest_key`] only when `is_url_source` is set.
pub async fn do_copy_single(
    src: &Arc<dyn Storage>,
    dest: &Arc<dyn Storage>,
    descriptor: &ObjectDescriptor,
    acl: CannedAcl,
    permits: &Semaphore,
    limiter: Option<&Arc<TokenBucket>>,
    params: &SingleCopyParams,
    source_is_rangeable: bool,
    is_url_source: bool,
    dest_is_file: bool,
) -> Result<(), sync_api::SyncError> {
    let src_key = descriptor.key.as_str();
    let dest_key = if is_url_source {
        url_source_dest_key(src_key)
    } else {
        src_key
    };

    if source_is_rangeable && descriptor.size > params.max_block_bytes {
        let downloader = RangedDownloader::spawn(
            src_key.to_string(),
            descriptor.size,
            crate::DOWNLOAD_PAGE_SIZE,
            params.downloader_concurrency,
            src.clone(),
            limiter.cloned(),
        );
        let body = if dest_is_file {
            PutBody::new(Box::pin(downloader), descriptor.size)
        } else {
            spool_to_seekable(downloader, descriptor.size).await?
        };
        return put_swallowing_source_deletion(src, dest, src_key, dest_key, body, acl).await;
    }

    if let Some(limiter) = limiter {
        limiter.acquire(descriptor.size).await;
    }
    let _permit = permits.acquire().await.expect("permit semaphore closed");

    let body = if descriptor.size == 0 {
        PutBody::empty()
    } else {
        let reader = src.get(src_key, 0, None).await?;
        PutBody::new(reader, descriptor.size)
    };
    put_swallowing_source_deletion(src, dest, src_key, dest_key, body, acl).await
}

/// Spools a ranged downloader's output into an unlinked temporary file and
/// rewinds it, so a `Put` body that isn't going to a local-file destination
/// gets a seekable reader. Several HTTP-based backends need to re-read the
/// body to sign or retry the request, which an in-flight streaming
/// downloader can't offer.
async fn spool_to_seekable(
    mut downloader: RangedDownloader,
    size: u64,
) -> Result<PutBody, sync_api::SyncError> {
    let file = tempfile::tempfile().map_err(sync_api::SyncError::Io)?;
    let mut file = tokio::fs::File::from_std(file);
    tokio::io::copy(&mut downloader, &mut file).await?;
    file.flush().await?;
    file.seek(std::io::SeekFrom::Start(0)).await?;
    Ok(PutBody::new(Box::pin(file), size))
}

async fn put_swallowing_source_deletion(
    src: &Arc<dyn Storage>,
    dest: &Arc<dyn Storage>,
    src_key: &str,
    dest_key: &str,
    body: PutBody,
    acl: CannedAcl,
) -> Result<(), sync_api::SyncError> {
    match dest.put(dest_key, body, acl).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if src.head(src_key).await.is_err_and(|e| e.is_not_found()) {
                // Source disappeared mid-copy: treat as a no-op success.
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}

/// Reads a bounded prefix for backends whose `Get` requires an explicit
/// byte count rather than "to EOF" (used by the multipart part reader).
/// Draws its scratch buffer from `pool`'s multipart size class.
pub async fn read_full(
    src: &Arc<dyn Storage>,
    key: &str,
    off: u64,
    len: u64,
    pool: &crate::BufferPool,
) -> Result<bytes::Bytes, sync_api::SyncError> {
    let mut reader = src.get(key, off, Some(len)).await?;
    let mut buf = pool.take_multipart_buffer(len as usize);
    reader.read_exact(&mut buf[..len as usize]).await?;
    Ok(bytes::Bytes::copy_from_slice(&buf[..len as usize]))
}
