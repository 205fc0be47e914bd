//! Genuine AWS S3 backend, via the native `aws-sdk-s3` client rather than
//! the shared REST-dialect implementation used for the other four providers
//! (see [`super::s3compat`]): a `Client` built once from a credentials chain
//! plus an optional custom endpoint, with per-request metadata used for the
//! checksum header.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use futures::stream::BoxStream;
use sync_api::{CannedAcl, ObjectDescriptor, ResourceType, StorageUri, SyncError};

use crate::{BoxReader, ListResult, MultipartUpload, PutBody, Storage, UploadedPart};

const CHECKSUM_METADATA_KEY: &str = "cuoss-crc32c";

pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(uri: &StorageUri) -> Result<Self, SyncError> {
        debug_assert_eq!(uri.resource_type, ResourceType::S3);
        let (bucket, region) = split_domain(&uri.bucket_domain)?;

        let credentials = Credentials::new(
            uri.access_key.clone(),
            uri.secret_key.clone(),
            None,
            None,
            "sync-uri",
        );
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(SharedCredentialsProvider::new(credentials))
            .build();

        Ok(Self {
            client: Client::from_conf(config),
            bucket,
        })
    }
}

/// Splits `{bucket}.{region}.amazonaws.com` back into its parts (the
/// inverse of `uri::synthesize_domain` for `ResourceType::S3`).
fn split_domain(domain: &str) -> Result<(String, String), SyncError> {
    let suffix = ".amazonaws.com";
    let rest = domain
        .strip_suffix(suffix)
        .ok_or_else(|| SyncError::invalid_uri(format!("not an s3 domain: {domain:?}")))?;
    let (bucket, region) = rest
        .split_once('.')
        .ok_or_else(|| SyncError::invalid_uri(format!("not an s3 domain: {domain:?}")))?;
    Ok((bucket.to_string(), region.to_string()))
}

fn map_not_found<E>(err: SdkError<E>, key: &str, is_not_found: impl Fn(&E) -> bool) -> SyncError
where
    E: std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(se) if is_not_found(se.err()) => {
            SyncError::NotFound(key.to_string())
        }
        _ => SyncError::Transient(err.to_string()),
    }
}

fn acl_to_canned(acl: CannedAcl) -> Option<aws_sdk_s3::types::ObjectCannedAcl> {
    use aws_sdk_s3::types::ObjectCannedAcl;
    match acl {
        CannedAcl::Default => None,
        CannedAcl::Private => Some(ObjectCannedAcl::Private),
        CannedAcl::PublicRead => Some(ObjectCannedAcl::PublicRead),
        CannedAcl::PublicReadWrite => Some(ObjectCannedAcl::PublicReadWrite),
        CannedAcl::AuthenticatedRead => Some(ObjectCannedAcl::AuthenticatedRead),
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn head(&self, key: &str) -> Result<ObjectDescriptor, SyncError> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                map_not_found(e, key, |e: &aws_sdk_s3::operation::head_object::HeadObjectError| {
                    e.is_not_found()
                })
            })?;
        let size = resp.content_length().unwrap_or(0).max(0) as u64;
        let mtime = resp
            .last_modified()
            .and_then(|t| t.secs().try_into().ok())
            .unwrap_or(0);
        Ok(ObjectDescriptor::new(key, size, mtime))
    }

    async fn get(&self, key: &str, off: u64, limit: Option<u64>) -> Result<BoxReader, SyncError> {
        let range = match limit {
            Some(n) => Some(format!("bytes={}-{}", off, off + n.saturating_sub(1))),
            None if off > 0 => Some(format!("bytes={off}-")),
            None => None,
        };
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range)
            .send()
            .await
            .map_err(|e| {
                map_not_found(e, key, |e: &aws_sdk_s3::operation::get_object::GetObjectError| {
                    e.is_no_such_key()
                })
            })?;
        let checksum = resp
            .metadata()
            .and_then(|m| m.get(CHECKSUM_METADATA_KEY))
            .cloned();
        let reader: BoxReader = Box::pin(resp.body.into_async_read());
        Ok(match checksum {
            Some(expected) if off == 0 && limit.is_none() => Box::pin(
                crate::checksum::VerifyingReader::new(reader, crate::checksum::ChecksumAlgorithm::Crc32c, expected),
            ),
            _ => reader,
        })
    }

    async fn put(&self, key: &str, mut body: PutBody, acl: CannedAcl) -> Result<(), SyncError> {
        let buffered = crate::checksum::buffer_and_checksum(
            std::mem::replace(&mut body.reader, Box::pin(tokio::io::empty())),
            crate::checksum::ChecksumAlgorithm::Crc32c,
        )
        .await?;
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(buffered.bytes))
            .metadata(CHECKSUM_METADATA_KEY, buffered.digest);
        if let Some(canned) = acl_to_canned(acl) {
            req = req.acl(canned);
        }
        req.send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SyncError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn list(
        &self,
        prefix: &str,
        marker: &str,
        max: usize,
    ) -> Result<Vec<ObjectDescriptor>, SyncError> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .start_after(marker)
            .max_keys(max as i32)
            .send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;
        Ok(resp
            .contents()
            .iter()
            .map(|o| {
                let key = o.key().unwrap_or_default().to_string();
                let size = o.size().unwrap_or(0).max(0) as u64;
                let mtime = o
                    .last_modified()
                    .and_then(|t| t.secs().try_into().ok())
                    .unwrap_or(0);
                ObjectDescriptor::new(key, size, mtime)
            })
            .collect())
    }

    fn list_all(&self, prefix: String, marker: String) -> BoxStream<'static, ListResult> {
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        Box::pin(async_stream::stream! {
            let mut continuation: Option<String> = None;
            loop {
                let mut req = client
                    .list_objects_v2()
                    .bucket(&bucket)
                    .prefix(&prefix)
                    .start_after(&marker);
                if let Some(token) = continuation.clone() {
                    req = req.continuation_token(token);
                }
                let resp = match req.send().await {
                    Ok(r) => r,
                    Err(e) => {
                        yield Err(SyncError::Transient(e.to_string()));
                        return;
                    }
                };
                for o in resp.contents() {
                    let key = o.key().unwrap_or_default().to_string();
                    let size = o.size().unwrap_or(0).max(0) as u64;
                    let mtime = o
                        .last_modified()
                        .and_then(|t| t.secs().try_into().ok())
                        .unwrap_or(0);
                    yield Ok(ObjectDescriptor::new(key, size, mtime));
                }
                continuation = resp.next_continuation_token().map(|s| s.to_string());
                if continuation.is_none() {
                    break;
                }
            }
        })
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        min_part_size: u64,
        acl: CannedAcl,
    ) -> Result<MultipartUpload, SyncError> {
        let mut req = self.client.create_multipart_upload().bucket(&self.bucket).key(key);
        if let Some(canned) = acl_to_canned(acl) {
            req = req.acl(canned);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;
        Ok(MultipartUpload {
            upload_id: resp.upload_id().unwrap_or_default().to_string(),
            min_part_size,
            max_count: 10_000,
        })
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        num: u32,
        bytes: bytes::Bytes,
    ) -> Result<UploadedPart, SyncError> {
        let resp = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(num as i32)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;
        Ok(UploadedPart {
            num,
            etag: resp.e_tag().unwrap_or_default().to_string(),
        })
    }

    async fn complete_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<(), SyncError> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .into_iter()
                    .map(|p| {
                        CompletedPart::builder()
                            .part_number(p.num as i32)
                            .e_tag(p.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;
        Ok(())
    }

    async fn abort_upload(&self, key: &str, upload_id: &str) {
        let _ = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;
    }

    async fn get_object_acl(&self, key: &str) -> Result<CannedAcl, SyncError> {
        let resp = self
            .client
            .get_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| SyncError::Transient(e.to_string()))?;
        let grants = resp.grants();
        let pairs: Vec<(&str, &str)> = grants
            .iter()
            .filter_map(|g| {
                let grantee = g.grantee()?;
                let uri = grantee.uri().unwrap_or_default();
                let grantee_name = if uri.ends_with("AllUsers") {
                    "AllUsers"
                } else if uri.ends_with("AuthenticatedUsers") {
                    "AuthenticatedUsers"
                } else {
                    return None;
                };
                let permission = g.permission()?.as_str();
                Some((grantee_name, permission))
            })
            .collect();
        Ok(CannedAcl::from_grants(pairs))
    }

    async fn create(&self) -> Result<(), SyncError> {
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(se))
                if se.err().is_bucket_already_owned_by_you()
                    || se.err().is_bucket_already_exists() =>
            {
                Ok(())
            }
            Err(e) => Err(SyncError::Transient(e.to_string())),
        }
    }

    fn checksum_metadata_key(&self) -> Option<&'static str> {
        Some(CHECKSUM_METADATA_KEY)
    }
}
