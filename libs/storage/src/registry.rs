//! Process-wide storage-handle cache, keyed by `(type, bucketDomain)`.
//!
//! A small tagged enum dispatching to the concrete backend, plus a cache so
//! that two [`StorageUri`]s with the same cache key share one backend
//! instance, with racing constructions resolving to a single winner.

use std::sync::Arc;

use dashmap::DashMap;
use sync_api::{ResourceType, StorageUri, SyncError};

use crate::backends::{
    file::FileStorage, s3::S3Storage, s3compat::S3CompatStorage, urllist::UrlListStorage,
};
use crate::Storage;

/// Tagged-variant dispatch over the closed set of concrete backends. Avoids
/// both a `dyn Storage` trait object (which would lose the ability to match
/// on concrete type where useful, e.g. "is this destination a local file")
/// and a deep inheritance tree.
pub enum GenericStorage {
    File(FileStorage),
    Url(UrlListStorage),
    S3(S3Storage),
    S3Compat(S3CompatStorage),
}

macro_rules! dispatch {
    ($self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            GenericStorage::File(s) => s.$method($($arg),*).await,
            GenericStorage::Url(s) => s.$method($($arg),*).await,
            GenericStorage::S3(s) => s.$method($($arg),*).await,
            GenericStorage::S3Compat(s) => s.$method($($arg),*).await,
        }
    };
}

#[async_trait::async_trait]
impl Storage for GenericStorage {
    async fn head(&self, key: &str) -> Result<sync_api::ObjectDescriptor, SyncError> {
        dispatch!(self, head(key))
    }

    async fn get(
        &self,
        key: &str,
        off: u64,
        limit: Option<u64>,
    ) -> Result<crate::BoxReader, SyncError> {
        dispatch!(self, get(key, off, limit))
    }

    async fn put(
        &self,
        key: &str,
        body: crate::PutBody,
        acl: sync_api::CannedAcl,
    ) -> Result<(), SyncError> {
        dispatch!(self, put(key, body, acl))
    }

    async fn delete(&self, key: &str) -> Result<(), SyncError> {
        dispatch!(self, delete(key))
    }

    async fn list(
        &self,
        prefix: &str,
        marker: &str,
        max: usize,
    ) -> Result<Vec<sync_api::ObjectDescriptor>, SyncError> {
        dispatch!(self, list(prefix, marker, max))
    }

    fn list_all(
        &self,
        prefix: String,
        marker: String,
    ) -> futures::stream::BoxStream<'static, crate::ListResult> {
        match self {
            GenericStorage::File(s) => s.list_all(prefix, marker),
            GenericStorage::Url(s) => s.list_all(prefix, marker),
            GenericStorage::S3(s) => s.list_all(prefix, marker),
            GenericStorage::S3Compat(s) => s.list_all(prefix, marker),
        }
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        min_part_size: u64,
        acl: sync_api::CannedAcl,
    ) -> Result<crate::MultipartUpload, SyncError> {
        dispatch!(self, create_multipart_upload(key, min_part_size, acl))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        num: u32,
        bytes: bytes::Bytes,
    ) -> Result<crate::UploadedPart, SyncError> {
        dispatch!(self, upload_part(key, upload_id, num, bytes))
    }

    async fn complete_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<crate::UploadedPart>,
    ) -> Result<(), SyncError> {
        dispatch!(self, complete_upload(key, upload_id, parts))
    }

    async fn abort_upload(&self, key: &str, upload_id: &str) {
        match self {
            GenericStorage::File(s) => s.abort_upload(key, upload_id).await,
            GenericStorage::Url(s) => s.abort_upload(key, upload_id).await,
            GenericStorage::S3(s) => s.abort_upload(key, upload_id).await,
            GenericStorage::S3Compat(s) => s.abort_upload(key, upload_id).await,
        }
    }

    async fn get_object_acl(&self, key: &str) -> Result<sync_api::CannedAcl, SyncError> {
        dispatch!(self, get_object_acl(key))
    }

    async fn create(&self) -> Result<(), SyncError> {
        dispatch!(self, create())
    }

    fn checksum_metadata_key(&self) -> Option<&'static str> {
        match self {
            GenericStorage::File(s) => s.checksum_metadata_key(),
            GenericStorage::Url(s) => s.checksum_metadata_key(),
            GenericStorage::S3(s) => s.checksum_metadata_key(),
            GenericStorage::S3Compat(s) => s.checksum_metadata_key(),
        }
    }
}

/// The process-wide `(type, bucketDomain) -> GenericStorage` cache.
///
/// `dashmap`'s sharded locking gives us concurrent reads plus an
/// insert-once slot per key; `get_or_create` uses `entry()` so that two
/// racing callers constructing the same handle still end up sharing one
/// instance (single-flight insert, rather than both paying backend-startup
/// cost and the loser's instance being discarded silently).
#[derive(Default)]
pub struct Registry {
    handles: DashMap<(ResourceType, String), Arc<GenericStorage>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle for `uri`, constructing and inserting one
    /// if this is the first time this `(type, bucketDomain)` has been seen.
    pub fn get_or_create(&self, uri: &StorageUri) -> Result<Arc<GenericStorage>, SyncError> {
        let key = uri.cache_key();
        if let Some(existing) = self.handles.get(&key) {
            return Ok(Arc::clone(existing.value()));
        }
        let constructed = Arc::new(construct(uri)?);
        let entry = self
            .handles
            .entry(key)
            .or_insert_with(|| constructed.clone());
        Ok(Arc::clone(entry.value()))
    }
}

fn construct(uri: &StorageUri) -> Result<GenericStorage, SyncError> {
    Ok(match uri.resource_type {
        ResourceType::File => GenericStorage::File(FileStorage::new(&uri.bucket_domain)?),
        ResourceType::Url => GenericStorage::Url(UrlListStorage::new(&uri.bucket_domain)?),
        ResourceType::S3 => GenericStorage::S3(S3Storage::new(uri)?),
        ResourceType::Obs | ResourceType::Oss | ResourceType::Cos | ResourceType::Cuc => {
            GenericStorage::S3Compat(S3CompatStorage::new(uri.resource_type, uri)?)
        }
    })
}
