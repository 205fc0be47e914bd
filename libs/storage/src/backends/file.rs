//! Local filesystem backend: `Head`, `Get`, `Put` (atomic
//! temp-file + rename), `Delete`, `ListAll` (depth-first lexical walk,
//! symlinks followed). `List` paging is unsupported since the whole tree
//! is cheap to walk at once.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use futures::stream::BoxStream;
use sync_api::{CannedAcl, ObjectDescriptor, SyncError};
use tokio::io::AsyncSeekExt;

use crate::{BoxReader, ListResult, MultipartUpload, PutBody, Storage, UploadedPart};

pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: &str) -> Result<Self, SyncError> {
        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }
}

fn descriptor_for(path: &Path, key: String, meta: &std::fs::Metadata) -> ObjectDescriptor {
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let is_dir = meta.is_dir() || key.ends_with('/');
    let size = if is_dir { 0 } else { meta.len() };
    let _ = path;
    ObjectDescriptor {
        key,
        size,
        mtime,
        is_dir,
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn head(&self, key: &str) -> Result<ObjectDescriptor, SyncError> {
        let path = self.resolve(key);
        let meta = tokio::fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError::NotFound(key.to_string())
            } else {
                SyncError::Io(e)
            }
        })?;
        Ok(descriptor_for(&path, key.to_string(), &meta))
    }

    async fn get(&self, key: &str, off: u64, limit: Option<u64>) -> Result<BoxReader, SyncError> {
        let path = self.resolve(key);
        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SyncError::NotFound(key.to_string())
            } else {
                SyncError::Io(e)
            }
        })?;
        if off > 0 {
            file.seek(std::io::SeekFrom::Start(off)).await?;
        }
        let reader: BoxReader = match limit {
            Some(n) => Box::pin(tokio::io::AsyncReadExt::take(file, n)),
            None => Box::pin(file),
        };
        Ok(reader)
    }

    async fn put(&self, key: &str, mut body: PutBody, _acl: CannedAcl) -> Result<(), SyncError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = path.with_extension(format!(
            "tmp-{}",
            uuid_like_suffix()
        ));
        let mut tmp_file = tokio::fs::File::create(&tmp_path).await?;
        tokio::io::copy(&mut body.reader, &mut tmp_file).await?;
        tmp_file.sync_all().await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SyncError> {
        let path = self.resolve(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Io(e)),
        }
    }

    async fn list(
        &self,
        _prefix: &str,
        _marker: &str,
        _max: usize,
    ) -> Result<Vec<ObjectDescriptor>, SyncError> {
        Err(SyncError::Unsupported(
            "paged list is not supported by the file backend; use list_all".into(),
        ))
    }

    fn list_all(&self, prefix: String, marker: String) -> BoxStream<'static, ListResult> {
        let root = self.root.clone();
        Box::pin(async_stream::stream! {
            let walk_root = root.join(prefix.trim_start_matches('/'));
            let entries = tokio::task::spawn_blocking(move || {
                let mut entries = Vec::new();
                for entry in walkdir::WalkDir::new(&walk_root).follow_links(true) {
                    let entry = match entry {
                        Ok(e) => e,
                        Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
                    };
                    if entry.path() == walk_root {
                        continue;
                    }
                    let rel = entry
                        .path()
                        .strip_prefix(&root)
                        .unwrap_or(entry.path())
                        .to_string_lossy()
                        .replace(std::path::MAIN_SEPARATOR, "/");
                    let key = if entry.file_type().is_dir() {
                        format!("{rel}/")
                    } else {
                        rel
                    };
                    let meta = match entry.metadata() {
                        Ok(m) => m,
                        Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::Other, e)),
                    };
                    entries.push(descriptor_for(entry.path(), key, &meta));
                }
                entries.sort();
                Ok(entries)
            })
            .await;

            match entries {
                Ok(Ok(mut entries)) => {
                    entries.retain(|d| d.key.as_str() > marker.as_str());
                    for d in entries {
                        yield Ok(d);
                    }
                }
                Ok(Err(e)) => yield Err(SyncError::Io(e)),
                Err(join_err) => {
                    yield Err(SyncError::Transient(join_err.to_string()));
                }
            }
        })
    }

    async fn create_multipart_upload(
        &self,
        _key: &str,
        _min_part_size: u64,
        _acl: CannedAcl,
    ) -> Result<MultipartUpload, SyncError> {
        Err(SyncError::Unsupported(
            "local filesystem has no multipart upload concept".into(),
        ))
    }

    async fn upload_part(
        &self,
        _key: &str,
        _upload_id: &str,
        _num: u32,
        _bytes: bytes::Bytes,
    ) -> Result<UploadedPart, SyncError> {
        Err(SyncError::Unsupported("no multipart upload".into()))
    }

    async fn complete_upload(
        &self,
        _key: &str,
        _upload_id: &str,
        _parts: Vec<UploadedPart>,
    ) -> Result<(), SyncError> {
        Err(SyncError::Unsupported("no multipart upload".into()))
    }

    async fn create(&self) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}

fn uuid_like_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{nanos:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_head_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_str().unwrap()).unwrap();
        let body = PutBody::new(Box::pin(std::io::Cursor::new(b"hello".to_vec())), 5);
        storage.put("a/b.txt", body, CannedAcl::Default).await.unwrap();

        let desc = storage.head("a/b.txt").await.unwrap();
        assert_eq!(desc.size, 5);

        let mut reader = storage.get("a/b.txt", 0, None).await.unwrap();
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut out)
            .await
            .unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn head_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_str().unwrap()).unwrap();
        let err = storage.head("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_all_is_sorted_and_skips_marker() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_str().unwrap()).unwrap();
        for name in ["b.txt", "a.txt", "c.txt"] {
            let body = PutBody::new(Box::pin(std::io::Cursor::new(b"x".to_vec())), 1);
            storage.put(name, body, CannedAcl::Default).await.unwrap();
        }
        use futures::StreamExt;
        let keys: Vec<String> = storage
            .list_all(String::new(), "a.txt".to_string())
            .filter_map(|r| async move { r.ok().map(|d| d.key) })
            .collect()
            .await;
        assert_eq!(keys, vec!["b.txt".to_string(), "c.txt".to_string()]);
    }
}
