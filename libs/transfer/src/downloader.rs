//! Parallel ranged downloader: presents an `AsyncRead` interface
//! backed by fixed-size pages prefetched concurrently ahead of the read
//! cursor. Each page's concurrency permit travels with the page in the
//! shared map and is released by simply dropping it once the page is fully
//! consumed — that keeps "at most `capacity` pages pending" true without a
//! separate release call.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use parking_lot::Mutex;
use storage::Storage;
use sync_api::SyncError;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::{Notify, Semaphore};

use crate::ratelimit::TokenBucket;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

struct Shared {
    buffers: Mutex<HashMap<u64, (Bytes, tokio::sync::OwnedSemaphorePermit)>>,
    err: Mutex<Option<SyncError>>,
    notify: Notify,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl Shared {
    fn set_err(&self, e: SyncError) {
        let mut guard = self.err.lock();
        if guard.is_none() {
            *guard = Some(e);
        }
        self.notify.notify_waiters();
    }
}

struct CurrentPage {
    bytes: Bytes,
    pos: usize,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

/// Reads `key` in the range `[0, size)` via concurrently prefetched pages of
/// `block_size` bytes, honoring an optional rate limiter. Returned value
/// implements `AsyncRead`.
pub struct RangedDownloader {
    shared: Arc<Shared>,
    cursor: u64,
    size: u64,
    block_size: u64,
    current: Option<CurrentPage>,
    pending: Option<BoxFuture<Result<(Bytes, tokio::sync::OwnedSemaphorePermit), SyncError>>>,
}

impl RangedDownloader {
    pub fn spawn(
        key: String,
        size: u64,
        block_size: u64,
        concurrency: usize,
        storage: Arc<dyn Storage>,
        limiter: Option<Arc<TokenBucket>>,
    ) -> Self {
        let shared = Arc::new(Shared {
            buffers: Mutex::new(HashMap::new()),
            err: Mutex::new(None),
            notify: Notify::new(),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            closed: AtomicBool::new(false),
        });

        let prefetch_shared = shared.clone();
        tokio::spawn(async move {
            let mut off = 0u64;
            while off < size {
                if prefetch_shared.closed.load(Ordering::Acquire) {
                    break;
                }
                let permit = match prefetch_shared.permits.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => break,
                };
                let sz = block_size.min(size - off);
                let fetch_shared = prefetch_shared.clone();
                let fetch_storage = storage.clone();
                let fetch_limiter = limiter.clone();
                let fetch_key = key.clone();
                tokio::spawn(async move {
                    fetch_page(
                        fetch_key,
                        off,
                        sz,
                        fetch_storage,
                        fetch_limiter,
                        fetch_shared,
                        permit,
                    )
                    .await;
                });
                off += block_size;
            }
        });

        Self {
            shared,
            cursor: 0,
            size,
            block_size,
            current: None,
            pending: None,
        }
    }
}

async fn fetch_page(
    key: String,
    off: u64,
    sz: u64,
    storage: Arc<dyn Storage>,
    limiter: Option<Arc<TokenBucket>>,
    shared: Arc<Shared>,
    permit: tokio::sync::OwnedSemaphorePermit,
) {
    if shared.closed.load(Ordering::Acquire) || shared.err.lock().is_some() {
        drop(permit);
        return;
    }
    if let Some(limiter) = &limiter {
        limiter.acquire(sz).await;
    }

    let mut attempt = 0u32;
    let bytes = loop {
        attempt += 1;
        match fetch_once(&*storage, &key, off, sz).await {
            Ok(bytes) => break Some(bytes),
            Err(e) if attempt < 3 && e.kind() != sync_api::ErrorKind::NotFound => {
                tokio::time::sleep(std::time::Duration::from_millis(100 * attempt as u64)).await;
            }
            Err(e) => {
                shared.set_err(e);
                break None;
            }
        }
    };

    let Some(bytes) = bytes else {
        drop(permit);
        return;
    };

    if shared.closed.load(Ordering::Acquire) {
        drop(permit);
        return;
    }
    shared.buffers.lock().insert(off, (bytes, permit));
    shared.notify.notify_waiters();
}

async fn fetch_once(
    storage: &dyn Storage,
    key: &str,
    off: u64,
    sz: u64,
) -> Result<Bytes, SyncError> {
    let mut reader = storage.get(key, off, Some(sz)).await?;
    let mut buf = vec![0u8; sz as usize];
    reader.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

async fn wait_for_page(
    shared: Arc<Shared>,
    off: u64,
) -> Result<(Bytes, tokio::sync::OwnedSemaphorePermit), SyncError> {
    loop {
        let notified = shared.notify.notified();
        if let Some(page) = shared.buffers.lock().remove(&off) {
            return Ok(page);
        }
        if let Some(e) = shared.err.lock().as_ref() {
            return Err(clone_err(e));
        }
        if shared.closed.load(Ordering::Acquire) {
            return Err(SyncError::Cancelled);
        }
        notified.await;
    }
}

fn clone_err(e: &SyncError) -> SyncError {
    match e {
        SyncError::NotFound(s) => SyncError::NotFound(s.clone()),
        SyncError::Transient(s) => SyncError::Transient(s.clone()),
        SyncError::Auth(s) => SyncError::Auth(s.clone()),
        SyncError::Unsupported(s) => SyncError::Unsupported(s.clone()),
        SyncError::ChecksumMismatch(s) => SyncError::ChecksumMismatch(s.clone()),
        SyncError::Cancelled => SyncError::Cancelled,
        SyncError::Invalid(s) => SyncError::Invalid(s.clone()),
        SyncError::Io(e) => SyncError::Transient(e.to_string()),
    }
}

impl Drop for RangedDownloader {
    /// `Close`: marks the downloader closed and wakes any pending fetchers
    /// so they discard their page and release their permit instead of
    /// storing into a map nobody will ever drain.
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_waiters();
    }
}

impl AsyncRead for RangedDownloader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.cursor >= this.size {
                return Poll::Ready(Ok(()));
            }
            if this.current.is_none() {
                if this.pending.is_none() {
                    let off = (this.cursor / this.block_size) * this.block_size;
                    this.pending = Some(Box::pin(wait_for_page(this.shared.clone(), off)));
                }
                match this.pending.as_mut().unwrap().as_mut().poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Err(e)) => {
                        this.pending = None;
                        return Poll::Ready(Err(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            e.to_string(),
                        )));
                    }
                    Poll::Ready(Ok((bytes, permit))) => {
                        this.pending = None;
                        let start_pos = (this.cursor % this.block_size) as usize;
                        this.current = Some(CurrentPage {
                            bytes,
                            pos: start_pos,
                            _permit: permit,
                        });
                    }
                }
            }

            let page = this.current.as_mut().unwrap();
            let remaining = &page.bytes[page.pos..];
            let n = remaining.len().min(buf.remaining());
            buf.put_slice(&remaining[..n]);
            page.pos += n;
            this.cursor += n as u64;
            if page.pos >= page.bytes.len() {
                this.current = None;
            }
            return Poll::Ready(Ok(()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use storage::{BoxReader, ListResult, MultipartUpload, PutBody, UploadedPart};
    use sync_api::{CannedAcl, ObjectDescriptor};

    struct MemStorage {
        data: Vec<u8>,
    }

    #[async_trait]
    impl Storage for MemStorage {
        async fn head(&self, _key: &str) -> Result<ObjectDescriptor, SyncError> {
            Ok(ObjectDescriptor::new("k", self.data.len() as u64, 0))
        }

        async fn get(&self, _key: &str, off: u64, limit: Option<u64>) -> Result<BoxReader, SyncError> {
            let end = match limit {
                Some(l) => (off + l).min(self.data.len() as u64),
                None => self.data.len() as u64,
            };
            let slice = self.data[off as usize..end as usize].to_vec();
            Ok(Box::pin(std::io::Cursor::new(slice)))
        }

        async fn put(&self, _key: &str, _body: PutBody, _acl: CannedAcl) -> Result<(), SyncError> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<(), SyncError> {
            Ok(())
        }

        async fn list(
            &self,
            _prefix: &str,
            _marker: &str,
            _max: usize,
        ) -> Result<Vec<ObjectDescriptor>, SyncError> {
            Ok(vec![])
        }

        fn list_all(&self, _prefix: String, _marker: String) -> futures::stream::BoxStream<'static, ListResult> {
            Box::pin(futures::stream::empty())
        }

        async fn create_multipart_upload(
            &self,
            _key: &str,
            _min_part_size: u64,
            _acl: CannedAcl,
        ) -> Result<MultipartUpload, SyncError> {
            Err(SyncError::Unsupported("n/a".into()))
        }

        async fn upload_part(
            &self,
            _key: &str,
            _upload_id: &str,
            _num: u32,
            _bytes: bytes::Bytes,
        ) -> Result<UploadedPart, SyncError> {
            Err(SyncError::Unsupported("n/a".into()))
        }
    }

    #[tokio::test]
    async fn reassembles_pages_in_order() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let storage: Arc<dyn Storage> = Arc::new(MemStorage { data: data.clone() });
        let mut downloader =
            RangedDownloader::spawn("k".into(), data.len() as u64, 1024, 4, storage, None);

        let mut out = Vec::new();
        downloader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, data);
    }

    #[tokio::test]
    async fn zero_length_object_reads_eof_immediately() {
        let storage: Arc<dyn Storage> = Arc::new(MemStorage { data: vec![] });
        let mut downloader = RangedDownloader::spawn("k".into(), 0, 1024, 4, storage, None);
        let mut out = Vec::new();
        downloader.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
    }
}
