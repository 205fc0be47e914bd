//! The listing iterator: a lazy, strictly-ascending
//! stream of descriptors over one bucket, optionally bounded by `end`.
//!
//! Not a value consumers can rewind — once exhausted (or once it yields an
//! `Err`, the Rust rendering of "sentinel nil on failure") it's done. A
//! terminal `Err` means "the pipeline has stopped producing, but anything
//! already yielded is valid": callers must not treat it as
//! invalidating earlier items.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use storage::Storage;
use sync_api::{ObjectDescriptor, SyncError};

const LIST_PAGE_SIZE: usize = 1000;
const LIST_RETRIES: u32 = 3;

/// Produces the listing stream for one bucket, starting at `start`
/// (exclusive, except the one special-cased `Head` probe) and optionally
/// stopping once a key exceeds `end`.
pub fn list_bucket(
    storage: Arc<dyn Storage>,
    prefix: String,
    start: String,
    end: Option<String>,
) -> BoxStream<'static, Result<ObjectDescriptor, SyncError>> {
    Box::pin(async_stream::stream! {
        let mut last_key: Option<String> = None;

        if !start.is_empty() {
            match storage.head(&start).await {
                Ok(descriptor) => {
                    if within_bound(&descriptor.key, &end) {
                        last_key = Some(descriptor.key.clone());
                        yield Ok(descriptor);
                    } else {
                        return;
                    }
                }
                Err(e) if e.is_not_found() => {}
                Err(_) => {
                    // A failed probe isn't fatal to the listing itself; fall
                    // through to ListAll/List as if `start` simply wasn't present.
                }
            }
        }

        let all = storage.list_all(prefix.clone(), start.clone());
        let mut all = std::pin::pin!(all);
        let mut used_list_all = false;
        let mut unsupported = false;
        while let Some(item) = all.next().await {
            match item {
                Ok(descriptor) => {
                    used_list_all = true;
                    if !within_bound(&descriptor.key, &end) {
                        return;
                    }
                    check_order(&mut last_key, &descriptor.key);
                    last_key = Some(descriptor.key.clone());
                    yield Ok(descriptor);
                }
                Err(e) if e.kind() == sync_api::ErrorKind::Unsupported && !used_list_all => {
                    unsupported = true;
                    break;
                }
                Err(_) => {
                    // Terminal failure: sentinel, then close.
                    yield Err(SyncError::Transient("listing terminated early".into()));
                    return;
                }
            }
        }
        if used_list_all && !unsupported {
            return;
        }

        // Fall back to marker-paged `List`.
        let mut marker = last_key.clone().unwrap_or(start);
        loop {
            let mut attempt = 0;
            let page = loop {
                attempt += 1;
                match storage.list(&prefix, &marker, LIST_PAGE_SIZE).await {
                    Ok(page) => break Some(page),
                    Err(_) if attempt < LIST_RETRIES => {
                        tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                        continue;
                    }
                    Err(_) => break None,
                }
            };
            let Some(mut page) = page else {
                yield Err(SyncError::Transient("listing failed after retries".into()));
                return;
            };
            if page.is_empty() {
                return;
            }
            // Non-S3-compliant backends may repeat the marker as the first
            // entry of the next page; drop it rather than re-yielding it.
            if page.first().map(|d| d.key.as_str()) == Some(marker.as_str()) {
                page.remove(0);
                if page.is_empty() {
                    return;
                }
            }
            for descriptor in page {
                if !within_bound(&descriptor.key, &end) {
                    return;
                }
                check_order(&mut last_key, &descriptor.key);
                last_key = Some(descriptor.key.clone());
                marker = descriptor.key.clone();
                yield Ok(descriptor);
            }
        }
    })
}

fn within_bound(key: &str, end: &Option<String>) -> bool {
    match end {
        Some(end) => key <= end.as_str(),
        None => true,
    }
}

fn check_order(last_key: &mut Option<String>, key: &str) {
    if let Some(last) = last_key {
        if key <= last.as_str() {
            tracing::warn!(last = %last, current = %key, "listing returned out-of-order key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::BoxStream as FBoxStream;
    use std::sync::Mutex;
    use storage::{BoxReader, ListResult, MultipartUpload, PutBody, UploadedPart};
    use sync_api::CannedAcl;

    struct PagingOnlyStorage {
        pages: Mutex<Vec<Vec<ObjectDescriptor>>>,
    }

    #[async_trait]
    impl Storage for PagingOnlyStorage {
        async fn head(&self, key: &str) -> Result<ObjectDescriptor, SyncError> {
            Err(SyncError::NotFound(key.to_string()))
        }
        async fn get(&self, _key: &str, _off: u64, _limit: Option<u64>) -> Result<BoxReader, SyncError> {
            unimplemented!()
        }
        async fn put(&self, _key: &str, _body: PutBody, _acl: CannedAcl) -> Result<(), SyncError> {
            unimplemented!()
        }
        async fn delete(&self, _key: &str) -> Result<(), SyncError> {
            unimplemented!()
        }
        async fn list(
            &self,
            _prefix: &str,
            _marker: &str,
            _max: usize,
        ) -> Result<Vec<ObjectDescriptor>, SyncError> {
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(vec![]);
            }
            Ok(pages.remove(0))
        }
        fn list_all(&self, _prefix: String, _marker: String) -> FBoxStream<'static, ListResult> {
            Box::pin(futures::stream::once(async {
                Err(SyncError::Unsupported("no list_all".into()))
            }))
        }
        async fn create_multipart_upload(
            &self,
            _key: &str,
            _min_part_size: u64,
            _acl: CannedAcl,
        ) -> Result<MultipartUpload, SyncError> {
            unimplemented!()
        }
        async fn upload_part(
            &self,
            _key: &str,
            _upload_id: &str,
            _num: u32,
            _bytes: bytes::Bytes,
        ) -> Result<UploadedPart, SyncError> {
            unimplemented!()
        }
        async fn complete_upload(
            &self,
            _key: &str,
            _upload_id: &str,
            _parts: Vec<UploadedPart>,
        ) -> Result<(), SyncError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn pages_through_list_and_stops_on_empty_page() {
        let storage: Arc<dyn Storage> = Arc::new(PagingOnlyStorage {
            pages: Mutex::new(vec![
                vec![
                    ObjectDescriptor::new("a", 1, 0),
                    ObjectDescriptor::new("b", 1, 0),
                ],
                vec![ObjectDescriptor::new("c", 1, 0)],
                vec![],
            ]),
        });
        let stream = list_bucket(storage, String::new(), String::new(), None);
        let keys: Vec<String> = stream
            .filter_map(|r| async move { r.ok().map(|d| d.key) })
            .collect()
            .await;
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn skips_first_entry_equal_to_marker() {
        let storage: Arc<dyn Storage> = Arc::new(PagingOnlyStorage {
            pages: Mutex::new(vec![
                vec![
                    ObjectDescriptor::new("m", 1, 0),
                    ObjectDescriptor::new("n", 1, 0),
                ],
                vec![],
            ]),
        });
        let stream = list_bucket(storage, String::new(), "m".to_string(), None);
        let keys: Vec<String> = stream
            .filter_map(|r| async move { r.ok().map(|d| d.key) })
            .collect()
            .await;
        assert_eq!(keys, vec!["n"]);
    }
}
