//! URL-list source: a local text file of `<sourceURL> <destKey>`
//! lines. Read-only and not required to be key-ordered — it's only ever
//! used as the source side of a one-way (`To`/`From`) pair, never diffed
//! against a destination listing.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use sync_api::{CannedAcl, ObjectDescriptor, SyncError};

use crate::{BoxReader, ListResult, MultipartUpload, PutBody, Storage, UploadedPart};

pub struct UrlListStorage {
    list_path: String,
    client: reqwest::Client,
}

impl UrlListStorage {
    pub fn new(list_path: &str) -> Result<Self, SyncError> {
        Ok(Self {
            list_path: list_path.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Splits a descriptor key of the form `"<srcURL> <destKey>"`.
    pub fn split_key(key: &str) -> Result<(&str, &str), SyncError> {
        key.split_once(char::is_whitespace)
            .map(|(url, dest)| (url, dest.trim()))
            .ok_or_else(|| {
                SyncError::Invalid(format!("url-list key {key:?} is not \"<url> <destKey>\""))
            })
    }
}

#[async_trait]
impl Storage for UrlListStorage {
    async fn head(&self, key: &str) -> Result<ObjectDescriptor, SyncError> {
        let (url, _dest) = Self::split_key(key)?;
        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(key.to_string()));
        }
        let size = resp
            .content_length()
            .or_else(|| {
                resp.headers()
                    .get(reqwest::header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(0);
        Ok(ObjectDescriptor::new(key, size, 0))
    }

    async fn get(&self, key: &str, off: u64, limit: Option<u64>) -> Result<BoxReader, SyncError> {
        let (url, _dest) = Self::split_key(key)?;
        let mut req = self.client.get(url);
        if off > 0 || limit.is_some() {
            let range = match limit {
                Some(n) => format!("bytes={}-{}", off, off + n.saturating_sub(1)),
                None => format!("bytes={off}-"),
            };
            req = req.header(reqwest::header::RANGE, range);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(key.to_string()));
        }
        if !resp.status().is_success() {
            return Err(SyncError::Transient(format!(
                "GET {url} returned {}",
                resp.status()
            )));
        }
        let stream = resp
            .bytes_stream()
            .map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));
        let reader = tokio_util::io::StreamReader::new(stream);
        Ok(Box::pin(reader))
    }

    async fn put(&self, _key: &str, _body: PutBody, _acl: CannedAcl) -> Result<(), SyncError> {
        Err(SyncError::Unsupported("url-list source is read-only".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), SyncError> {
        Err(SyncError::Unsupported("url-list source is read-only".into()))
    }

    async fn list(
        &self,
        _prefix: &str,
        _marker: &str,
        _max: usize,
    ) -> Result<Vec<ObjectDescriptor>, SyncError> {
        Err(SyncError::Unsupported("url-list has no paged list; use list_all".into()))
    }

    fn list_all(&self, _prefix: String, marker: String) -> BoxStream<'static, ListResult> {
        let list_path = self.list_path.clone();
        Box::pin(async_stream::stream! {
            let contents = match tokio::fs::read_to_string(&list_path).await {
                Ok(c) => c,
                Err(e) => {
                    yield Err(SyncError::Io(e));
                    return;
                }
            };
            let mut past_marker = marker.is_empty();
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !past_marker {
                    if line == marker {
                        past_marker = true;
                    }
                    continue;
                }
                yield Ok(ObjectDescriptor::new(line, 0, 0));
            }
        })
    }

    async fn create_multipart_upload(
        &self,
        _key: &str,
        _min_part_size: u64,
        _acl: CannedAcl,
    ) -> Result<MultipartUpload, SyncError> {
        Err(SyncError::Unsupported("url-list source is read-only".into()))
    }

    async fn upload_part(
        &self,
        _key: &str,
        _upload_id: &str,
        _num: u32,
        _bytes: bytes::Bytes,
    ) -> Result<UploadedPart, SyncError> {
        Err(SyncError::Unsupported("url-list source is read-only".into()))
    }

    async fn complete_upload(
        &self,
        _key: &str,
        _upload_id: &str,
        _parts: Vec<UploadedPart>,
    ) -> Result<(), SyncError> {
        Err(SyncError::Unsupported("url-list source is read-only".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_key_into_url_and_dest() {
        let (url, dest) = UrlListStorage::split_key("https://example.com/a.bin dest/a.bin").unwrap();
        assert_eq!(url, "https://example.com/a.bin");
        assert_eq!(dest, "dest/a.bin");
    }

    #[test]
    fn rejects_key_without_whitespace() {
        assert!(UrlListStorage::split_key("no-whitespace-here").is_err());
    }
}
