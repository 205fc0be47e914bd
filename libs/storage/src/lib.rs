//! Uniform `Storage` contract over heterogeneous object-storage providers,
//! and the process-wide registry that caches one backend instance per
//! `(type, bucketDomain)` pair.
//!
//! Tagged-variant dispatch over a small, closed set of concrete backends
//! rather than a `dyn Trait` object or a deep inheritance tree.

pub mod backends;
pub mod checksum;
pub mod inventory;
pub mod registry;

use async_trait::async_trait;
use futures::stream::BoxStream;
use sync_api::{CannedAcl, ObjectDescriptor, SyncError};

/// Boxed streaming reader returned by `Get`.
pub type BoxReader = std::pin::Pin<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;

/// One item of a `ListAll` stream. The terminal `Err` item (if any) is the
/// Rust rendering of the original "sentinel nil on failure": the stream
/// simply ends after it, and the consumer (the listing iterator in
/// `pairing`) treats any `Err` as "the listing pipeline has terminated, but
/// everything already yielded is valid".
pub type ListResult = Result<ObjectDescriptor, SyncError>;

/// A freshly created multipart upload.
#[derive(Debug, Clone)]
pub struct MultipartUpload {
    pub upload_id: String,
    pub min_part_size: u64,
    pub max_count: u32,
}

/// One completed part, ready to be handed to `complete_upload` in ascending
/// `num` order.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub num: u32,
    pub etag: String,
}

/// Either end of an upload: the full body and its declared length, used by
/// `put` so that backends requiring `Content-Length` (most HTTP-based ones)
/// don't have to buffer to find out.
pub struct PutBody {
    pub reader: BoxReader,
    pub size: u64,
}

impl PutBody {
    pub fn new(reader: BoxReader, size: u64) -> Self {
        Self { reader, size }
    }

    pub fn empty() -> Self {
        Self {
            reader: Box::pin(tokio::io::empty()),
            size: 0,
        }
    }
}

/// The uniform operation set every backend exposes.
///
/// `create` folds bucket-level provisioning into the same per-object
/// contract below rather than a separate bucket registry. Backends that
/// cannot sensibly support a given operation (e.g. `url` has no `Put`)
/// return `SyncError::Unsupported`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Looks up a single object's descriptor.
    async fn head(&self, key: &str) -> Result<ObjectDescriptor, SyncError>;

    /// Streams the object body. `limit = None` reads to EOF.
    async fn get(&self, key: &str, off: u64, limit: Option<u64>) -> Result<BoxReader, SyncError>;

    /// Uploads a full object body with an optional canned ACL.
    async fn put(&self, key: &str, body: PutBody, acl: CannedAcl) -> Result<(), SyncError>;

    /// Deletes an object; a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), SyncError>;

    /// One page of a lexicographically ordered listing, strictly greater
    /// than `marker`, capped at `max` entries.
    async fn list(
        &self,
        prefix: &str,
        marker: &str,
        max: usize,
    ) -> Result<Vec<ObjectDescriptor>, SyncError>;

    /// Lazy full listing, if the backend can offer one more cheaply than
    /// repeated `list` paging (most can). Backends without a native
    /// "list everything" API return `Unsupported` so the caller falls back
    /// to paging via `list`.
    fn list_all(&self, prefix: String, marker: String) -> BoxStream<'static, ListResult>;

    async fn create_multipart_upload(
        &self,
        key: &str,
        min_part_size: u64,
        acl: CannedAcl,
    ) -> Result<MultipartUpload, SyncError> {
        let _ = (key, min_part_size, acl);
        Err(SyncError::Unsupported(
            "multipart upload not supported by this backend".into(),
        ))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        num: u32,
        bytes: bytes::Bytes,
    ) -> Result<UploadedPart, SyncError> {
        let _ = (key, upload_id, num, bytes);
        Err(SyncError::Unsupported("multipart upload not supported".into()))
    }

    async fn complete_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<(), SyncError> {
        let _ = (key, upload_id, parts);
        Err(SyncError::Unsupported("multipart upload not supported".into()))
    }

    /// Best-effort: failures are logged by the caller, never propagated.
    async fn abort_upload(&self, key: &str, upload_id: &str) {
        let _ = (key, upload_id);
    }

    async fn get_object_acl(&self, key: &str) -> Result<CannedAcl, SyncError> {
        let _ = key;
        Ok(CannedAcl::Default)
    }

    /// Creates the bucket this handle addresses, if the backend has a
    /// notion of bucket creation. Idempotent: "already exists" is success.
    async fn create(&self) -> Result<(), SyncError> {
        Ok(())
    }

    /// Backend-specific metadata key used to stash a checksum, or `None` if
    /// this backend doesn't support custom object metadata.
    fn checksum_metadata_key(&self) -> Option<&'static str> {
        None
    }
}
